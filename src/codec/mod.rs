// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    convert::TryFrom,
    io::{self, Cursor, Error, ErrorKind},
};

use byteorder::{BigEndian, ReadBytesExt as _};
use bytes::{Buf as _, BufMut as _, Bytes, BytesMut};

use crate::{
    frame::{RequestPdu, ResponsePdu},
    ExceptionCode, ExceptionResponse, FunctionCode, Request, Response,
};

pub(crate) mod tcp;

/// Maximum request/response PDU size.
///
/// As defined by the Modbus application protocol.
const MAX_PDU_SIZE: usize = 253;

/// Bit that marks a response function code as an exception.
const EXCEPTION_FLAG: u8 = 0x80;

#[allow(clippy::cast_possible_truncation)]
fn u16_len(len: usize) -> u16 {
    // This type conversion should always be safe, because either
    // the caller is responsible to pass a valid usize or the
    // possible values are limited by the protocol.
    debug_assert!(len <= u16::MAX.into());
    len as u16
}

#[allow(clippy::cast_possible_truncation)]
fn u8_len(len: usize) -> u8 {
    debug_assert!(len <= u8::MAX.into());
    len as u8
}

fn encode_request_pdu(buf: &mut BytesMut, request: &Request) {
    use Request::*;
    buf.put_u8(request.function_code().value());
    match request {
        ReadHoldingRegisters(address, quantity) => {
            buf.put_u16(*address);
            buf.put_u16(*quantity);
        }
        WriteSingleRegister(address, word) => {
            buf.put_u16(*address);
            buf.put_u16(*word);
        }
        WriteMultipleRegisters(address, words) => {
            buf.put_u16(*address);
            let len = words.len();
            buf.put_u16(u16_len(len));
            buf.put_u8(u8_len(len * 2));
            for w in words {
                buf.put_u16(*w);
            }
        }
        Custom(_, custom_data) => {
            buf.put_slice(custom_data);
        }
    }
}

fn encode_response_pdu(buf: &mut BytesMut, response: &Response) {
    use Response::*;
    buf.put_u8(response.function_code().value());
    match response {
        ReadHoldingRegisters(registers) => {
            buf.put_u8(u8_len(registers.len() * 2));
            for r in registers {
                buf.put_u16(*r);
            }
        }
        WriteSingleRegister(address, word) => {
            buf.put_u16(*address);
            buf.put_u16(*word);
        }
        WriteMultipleRegisters(address, quantity) => {
            buf.put_u16(*address);
            buf.put_u16(*quantity);
        }
    }
}

fn encode_exception_response_pdu(buf: &mut BytesMut, rsp: ExceptionResponse) {
    debug_assert!(rsp.function.value() < EXCEPTION_FLAG);
    buf.put_u8(rsp.function.value() | EXCEPTION_FLAG);
    buf.put_u8(rsp.exception.into());
}

fn encode_response_result_pdu(buf: &mut BytesMut, res: &Result<Response, ExceptionResponse>) {
    match res {
        Ok(rsp) => encode_response_pdu(buf, rsp),
        Err(rsp) => encode_exception_response_pdu(buf, *rsp),
    }
}

fn read_u16_be(reader: &mut impl io::Read) -> io::Result<u16> {
    reader.read_u16::<BigEndian>()
}

fn read_words(reader: &mut impl io::Read, quantity: usize) -> io::Result<Vec<u16>> {
    let mut data = Vec::with_capacity(quantity);
    for _ in 0..quantity {
        data.push(read_u16_be(reader)?);
    }
    Ok(data)
}

fn request_pdu_size(request: &Request) -> io::Result<usize> {
    use Request::*;
    let size = 1 + match request {
        ReadHoldingRegisters(_, _) | WriteSingleRegister(_, _) => 4,
        WriteMultipleRegisters(_, words) => 5 + words.len() * 2,
        Custom(_, data) => data.len(),
    };
    check_pdu_size(size)
}

fn response_result_pdu_size(res: &Result<Response, ExceptionResponse>) -> io::Result<usize> {
    use Response::*;
    let size = match res {
        Ok(ReadHoldingRegisters(words)) => 2 + words.len() * 2,
        Ok(WriteSingleRegister(_, _) | WriteMultipleRegisters(_, _)) => 5,
        Err(_) => 2,
    };
    check_pdu_size(size)
}

fn check_pdu_size(size: usize) -> io::Result<usize> {
    if size > MAX_PDU_SIZE {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("PDU size exceeded: {size} > {MAX_PDU_SIZE}"),
        ));
    }
    Ok(size)
}

impl TryFrom<Bytes> for Request {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() > MAX_PDU_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "request PDU size exceeded",
            ));
        }
        let rdr = &mut Cursor::new(&bytes);
        let fn_code = rdr.read_u8()?;
        let req = match FunctionCode::new(fn_code) {
            FunctionCode::ReadHoldingRegisters => {
                Request::ReadHoldingRegisters(read_u16_be(rdr)?, read_u16_be(rdr)?)
            }
            FunctionCode::WriteSingleRegister => {
                Request::WriteSingleRegister(read_u16_be(rdr)?, read_u16_be(rdr)?)
            }
            FunctionCode::WriteMultipleRegisters => {
                let address = read_u16_be(rdr)?;
                let quantity = usize::from(read_u16_be(rdr)?);
                let byte_count = usize::from(rdr.read_u8()?);
                if byte_count != quantity * 2 {
                    return Err(Error::new(ErrorKind::InvalidData, "invalid quantity"));
                }
                Request::WriteMultipleRegisters(address, read_words(rdr, quantity)?)
            }
            FunctionCode::Custom(code) if code < EXCEPTION_FLAG => {
                // Consume all remaining bytes as custom data.
                return Ok(Request::Custom(code, bytes[1..].to_vec()));
            }
            FunctionCode::Custom(code) => {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("invalid function code: 0x{code:02X}"),
                ));
            }
        };
        // Verify that all data has been consumed and decoded.
        if rdr.has_remaining() {
            return Err(Error::new(ErrorKind::InvalidData, "undecoded request data"));
        }
        Ok(req)
    }
}

impl TryFrom<Bytes> for RequestPdu {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let pdu = Request::try_from(bytes)?.into();
        Ok(pdu)
    }
}

impl TryFrom<Bytes> for Response {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() > MAX_PDU_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "response PDU size exceeded",
            ));
        }
        let rdr = &mut Cursor::new(&bytes);
        let fn_code = rdr.read_u8()?;
        let rsp = match FunctionCode::new(fn_code) {
            FunctionCode::ReadHoldingRegisters => {
                let byte_count = rdr.read_u8()?;
                if byte_count % 2 != 0 {
                    return Err(Error::new(ErrorKind::InvalidData, "invalid quantity"));
                }
                Response::ReadHoldingRegisters(read_words(rdr, usize::from(byte_count / 2))?)
            }
            FunctionCode::WriteSingleRegister => {
                Response::WriteSingleRegister(read_u16_be(rdr)?, read_u16_be(rdr)?)
            }
            FunctionCode::WriteMultipleRegisters => {
                Response::WriteMultipleRegisters(read_u16_be(rdr)?, read_u16_be(rdr)?)
            }
            FunctionCode::Custom(code) => {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("unsupported function code: 0x{code:02X}"),
                ));
            }
        };
        // Verify that all data has been consumed and decoded.
        if rdr.has_remaining() {
            return Err(Error::new(ErrorKind::InvalidData, "undecoded response data"));
        }
        Ok(rsp)
    }
}

impl TryFrom<Bytes> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let mut rdr = Cursor::new(&bytes);
        let fn_err_code = rdr.read_u8()?;
        if fn_err_code < EXCEPTION_FLAG {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "invalid exception function code",
            ));
        }
        let function = FunctionCode::new(fn_err_code - EXCEPTION_FLAG);
        let exception = ExceptionCode::new(rdr.read_u8()?);
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl TryFrom<Bytes> for ResponsePdu {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let fn_code = bytes
            .first()
            .copied()
            .ok_or_else(|| Error::new(ErrorKind::UnexpectedEof, "empty response PDU"))?;
        if fn_code & EXCEPTION_FLAG != 0 {
            Ok(ExceptionResponse::try_from(bytes)?.into())
        } else {
            Ok(Response::try_from(bytes)?.into())
        }
    }
}
