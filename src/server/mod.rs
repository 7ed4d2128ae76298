// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus server skeleton

pub mod tcp;

pub use self::tcp::Server;

use crate::Error;

/// Lifetime ceiling on accepted connections.
pub const MAX_CONNECTIONS: u32 = 10;

/// Lifetime ceiling on answered requests.
pub const MAX_REQUESTS: u32 = 200;

/// Cause of a planned shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminated {
    /// More requests have been answered than allowed by the [`ServiceBudget`].
    RequestCeiling,
}

/// Process-wide counters that bound how long a server may run.
///
/// Both counters start at zero and are never reset. Crossing the
/// connection ceiling is fatal, crossing the request ceiling is a planned
/// shutdown. Neither distinguishes between peers or between successful and
/// failed sessions: ten reconnects disable the server permanently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBudget {
    max_connections: u32,
    max_requests: u32,
    total_connections: u32,
    total_requests: u32,
}

impl ServiceBudget {
    #[must_use]
    pub const fn new(max_connections: u32, max_requests: u32) -> Self {
        Self {
            max_connections,
            max_requests,
            total_connections: 0,
            total_requests: 0,
        }
    }

    #[must_use]
    pub const fn total_connections(&self) -> u32 {
        self.total_connections
    }

    #[must_use]
    pub const fn total_requests(&self) -> u32 {
        self.total_requests
    }

    /// Count an accepted connection.
    ///
    /// Returns the new total or [`Error::ConnectionCeiling`] once it exceeds the maximum.
    pub fn record_connection(&mut self) -> Result<u32, Error> {
        self.total_connections = self.total_connections.saturating_add(1);
        if self.total_connections > self.max_connections {
            return Err(Error::ConnectionCeiling {
                connections: self.total_connections,
                max: self.max_connections,
            });
        }
        Ok(self.total_connections)
    }

    /// Count an answered request, `Some` once the budget is used up.
    pub fn record_request(&mut self) -> Option<Terminated> {
        self.total_requests = self.total_requests.saturating_add(1);
        (self.total_requests > self.max_requests).then_some(Terminated::RequestCeiling)
    }
}

impl Default for ServiceBudget {
    fn default() -> Self {
        Self::new(MAX_CONNECTIONS, MAX_REQUESTS)
    }
}
