// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temperature supervision over [Modbus TCP](https://en.wikipedia.org/wiki/Modbus)
//! based on [tokio](https://tokio.rs).
//!
//! Two cooperating roles share a map of exactly two holding registers:
//!
//! | Address | Content                                  | Written by |
//! |---------|------------------------------------------|------------|
//! | `0`     | CPU temperature in milli-degrees Celsius | server     |
//! | `1`     | Control flag (`1` = start, else stop)    | client     |
//!
//! Modbus is based on a [master/slave](https://en.wikipedia.org/wiki/Master/slave_(technology))
//! model. To avoid confusions with the tokio terminology the master is called
//! *client* and the slave is called *server* in this crate.
//!
//! - The [server](crate::server) refreshes the temperature register from a
//!   [sensor](crate::sensor) on every read request and derives start/stop
//!   flags from every write to the control register. Its lifetime is bounded
//!   by a [`ServiceBudget`](crate::server::ServiceBudget).
//! - The [client](crate::client) is driven by a
//!   [`PollScheduler`](crate::scheduler::PollScheduler) which reads the
//!   temperature at a fixed rate, feeds it through a
//!   [`Hysteresis`](crate::hysteresis::Hysteresis) evaluator and writes the
//!   control register whenever the resulting decision changes.

pub mod client;
pub mod config;
pub mod control;
pub mod hysteresis;
pub mod prelude;
pub mod registers;
pub mod scheduler;
pub mod sensor;
pub mod server;

mod codec;
mod error;
mod frame;

pub use self::error::{Error, ProtocolError};
pub use self::frame::{
    Address, ExceptionCode, ExceptionResponse, FunctionCode, Quantity, Request, Response, Word,
    CONTROL_REGISTER, TEMPERATURE_REGISTER,
};

/// Specialized [`std::result::Result`] type for client-side _Modbus_ calls.
///
/// The outer error covers transport and protocol failures, the inner one
/// the exception a server has answered with.
pub type Result<T> = std::result::Result<std::result::Result<T, ExceptionCode>, Error>;
