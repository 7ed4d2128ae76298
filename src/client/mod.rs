// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus clients

use std::fmt::Debug;

use async_trait::async_trait;

use crate::{frame::*, ProtocolError, Result};

pub mod tcp;

/// Transport independent asynchronous client trait
#[async_trait]
pub trait Client: Send + Debug {
    /// Invokes a _Modbus_ function.
    async fn call(&mut self, request: Request) -> Result<Response>;
}

/// Asynchronous _Modbus_ reader
#[async_trait]
pub trait Reader: Client {
    /// Read multiple holding registers (0x03)
    async fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        let response = match self.call(Request::ReadHoldingRegisters(addr, cnt)).await? {
            Ok(response) => response,
            Err(exception) => return Ok(Err(exception)),
        };
        match response {
            Response::ReadHoldingRegisters(words) if words.len() == usize::from(cnt) => {
                Ok(Ok(words))
            }
            Response::ReadHoldingRegisters(words) => Err(ProtocolError::QuantityMismatch {
                expected: cnt,
                actual: words.len(),
            }
            .into()),
            response => Err(ProtocolError::FunctionCodeMismatch {
                expected: FunctionCode::ReadHoldingRegisters,
                actual: response.function_code(),
            }
            .into()),
        }
    }
}

/// Asynchronous Modbus writer
#[async_trait]
pub trait Writer: Client {
    /// Write a single holding register (0x06)
    async fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()> {
        let response = match self.call(Request::WriteSingleRegister(addr, word)).await? {
            Ok(response) => response,
            Err(exception) => return Ok(Err(exception)),
        };
        match response {
            Response::WriteSingleRegister(rsp_addr, rsp_word)
                if rsp_addr == addr && rsp_word == word =>
            {
                Ok(Ok(()))
            }
            Response::WriteSingleRegister(rsp_addr, rsp_word) => {
                Err(ProtocolError::EchoMismatch {
                    expected: (addr, word),
                    actual: (rsp_addr, rsp_word),
                }
                .into())
            }
            response => Err(ProtocolError::FunctionCodeMismatch {
                expected: FunctionCode::WriteSingleRegister,
                actual: response.function_code(),
            }
            .into()),
        }
    }
}

/// Asynchronous Modbus client context
#[derive(Debug)]
pub struct Context {
    client: Box<dyn Client>,
}

impl From<Box<dyn Client>> for Context {
    fn from(client: Box<dyn Client>) -> Self {
        Self { client }
    }
}

impl From<Context> for Box<dyn Client> {
    fn from(val: Context) -> Self {
        val.client
    }
}

#[async_trait]
impl Client for Context {
    async fn call(&mut self, request: Request) -> Result<Response> {
        self.client.call(request).await
    }
}

impl Reader for Context {}

impl Writer for Context {}
