// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types and traits

///////////////////////////////////////////////////////////////////
/// Modules
///////////////////////////////////////////////////////////////////
pub use crate::client;

#[allow(missing_docs)]
pub mod tcp {
    pub use crate::client::tcp::*;
}

///////////////////////////////////////////////////////////////////
/// Types
///////////////////////////////////////////////////////////////////
pub use crate::{
    config::{LogRate, TargetTemperature},
    control::ControlIntent,
    scheduler::PollScheduler,
    server::{Server, ServiceBudget, Terminated},
    sensor::ThermalZone,
    ExceptionCode, Request, Response,
};

///////////////////////////////////////////////////////////////////
/// Traits
///////////////////////////////////////////////////////////////////
pub use crate::client::{Client, Reader, Writer};
pub use crate::sensor::TemperatureSensor;
