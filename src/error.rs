// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::{io, net::SocketAddr, time::Duration};

use thiserror::Error;

use crate::{Address, FunctionCode, Quantity, Word};

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// _Modbus_ protocol error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Transport I/O error.
    #[error(transparent)]
    Transport(#[from] io::Error),

    /// A request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server socket could not be set up.
    #[error("failed to listen on {addr}")]
    Listen { addr: SocketAddr, source: io::Error },

    /// More connections have been accepted than the server may ever serve.
    #[error("number of connections ({connections}) has exceeded the maximum of {max}")]
    ConnectionCeiling { connections: u32, max: u32 },
}

/// _Modbus_ protocol error.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The response header does not match the request.
    #[error("invalid response header: expected/request = {expected}, actual/response = {actual}")]
    HeaderMismatch { expected: String, actual: String },

    /// The function code of the response does not match the request.
    #[error("function code mismatch: expected/request = {expected}, actual/response = {actual}")]
    FunctionCodeMismatch {
        expected: FunctionCode,
        actual: FunctionCode,
    },

    /// The server returned a different number of registers than requested.
    #[error("quantity mismatch: expected/request = {expected}, actual/response = {actual}")]
    QuantityMismatch { expected: Quantity, actual: usize },

    /// A write response does not echo the written address and value.
    #[error("write echo mismatch: expected/request = {expected:?}, actual/response = {actual:?}")]
    EchoMismatch {
        expected: (Address, Word),
        actual: (Address, Word),
    },
}
