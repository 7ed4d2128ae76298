// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{Error, ErrorKind, Result};

use byteorder::{BigEndian, ByteOrder as _};
use bytes::{BufMut as _, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{tcp::*, RequestPdu, ResponsePdu};

use super::{
    encode_request_pdu, encode_response_result_pdu, request_pdu_size, response_result_pdu_size,
    MAX_PDU_SIZE,
};

const HEADER_LEN: usize = 7;

const PROTOCOL_ID: u16 = 0x0000; // TCP

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct AduDecoder;

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct ClientCodec {
    pub(crate) decoder: AduDecoder,
}

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct ServerCodec {
    pub(crate) decoder: AduDecoder,
}

impl Decoder for AduDecoder {
    type Item = (Header, Bytes);
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<(Header, Bytes)>> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        // len = bytes of PDU + one byte (unit ID)
        let len = usize::from(BigEndian::read_u16(&buf[4..6]));
        if len < 2 || len - 1 > MAX_PDU_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("invalid length field in MBAP header: {len}"),
            ));
        }
        let pdu_len = len - 1;
        if buf.len() < HEADER_LEN + pdu_len {
            return Ok(None);
        }

        let header_data = buf.split_to(HEADER_LEN);

        let protocol_id = BigEndian::read_u16(&header_data[2..4]);
        if protocol_id != PROTOCOL_ID {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "invalid protocol identifier: expected = {PROTOCOL_ID}, actual = {protocol_id}"
                ),
            ));
        }

        let transaction_id = BigEndian::read_u16(&header_data[0..2]);
        let unit_id = header_data[6];
        let header = Header {
            transaction_id,
            unit_id,
        };

        let pdu_data = buf.split_to(pdu_len).freeze();

        Ok(Some((header, pdu_data)))
    }
}

impl Decoder for ClientCodec {
    type Item = ResponseAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<ResponseAdu>> {
        let Some((hdr, pdu_data)) = self.decoder.decode(buf)? else {
            return Ok(None);
        };
        let pdu = ResponsePdu::try_from(pdu_data)?;
        Ok(Some(ResponseAdu { hdr, pdu }))
    }
}

impl Decoder for ServerCodec {
    type Item = RequestAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RequestAdu>> {
        let Some((hdr, pdu_data)) = self.decoder.decode(buf)? else {
            return Ok(None);
        };
        let pdu = RequestPdu::try_from(pdu_data)?;
        Ok(Some(RequestAdu { hdr, pdu }))
    }
}

impl Encoder<RequestAdu> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, adu: RequestAdu, buf: &mut BytesMut) -> Result<()> {
        let RequestAdu {
            hdr,
            pdu: RequestPdu(request),
        } = adu;
        let pdu_len = request_pdu_size(&request)?;
        buf.reserve(HEADER_LEN + pdu_len);
        encode_header(buf, hdr, pdu_len);
        encode_request_pdu(buf, &request);
        Ok(())
    }
}

impl Encoder<ResponseAdu> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, adu: ResponseAdu, buf: &mut BytesMut) -> Result<()> {
        let ResponseAdu {
            hdr,
            pdu: ResponsePdu(result),
        } = adu;
        let pdu_len = response_result_pdu_size(&result)?;
        buf.reserve(HEADER_LEN + pdu_len);
        encode_header(buf, hdr, pdu_len);
        encode_response_result_pdu(buf, &result);
        Ok(())
    }
}

fn encode_header(buf: &mut BytesMut, hdr: Header, pdu_len: usize) {
    buf.put_u16(hdr.transaction_id);
    buf.put_u16(PROTOCOL_ID);
    buf.put_u16(super::u16_len(pdu_len + 1));
    buf.put_u8(hdr.unit_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExceptionCode, ExceptionResponse, FunctionCode, Request, Response};

    const TRANSACTION_ID: TransactionId = 0x1501;
    const UNIT_ID: UnitId = 0xFF;

    mod client {
        use super::*;

        #[test]
        fn decode_header_fragment() {
            let mut codec = ClientCodec::default();
            let mut buf = BytesMut::from(&[0x00, 0x11, 0x00, 0x00, 0x00, 0x00][..]);
            let res = codec.decode(&mut buf).unwrap();
            assert!(res.is_none());
            assert_eq!(buf.len(), 6);
        }

        #[test]
        fn decode_partly_received_message() {
            let mut codec = ClientCodec::default();
            let mut buf = BytesMut::from(
                &[
                    0x00, // transaction id HI
                    0x11, // transaction id LO
                    0x00, // protocol id HI
                    0x00, // protocol id LO
                    0x00, // length HI
                    0x05, // length LO
                    0xFF, // unit id
                    0x03, // function code
                ][..],
            );
            let res = codec.decode(&mut buf).unwrap();
            assert!(res.is_none());
            assert_eq!(buf.len(), 8);
        }

        #[test]
        fn decode_read_response() {
            let mut codec = ClientCodec::default();
            let mut buf = BytesMut::from(
                &[
                    0x15, 0x01, 0x00, 0x00, 0x00, 0x05, 0xFF, 0x03, 0x02, 0xAB, 0xE0, 0x00,
                ][..],
            );
            let ResponseAdu { hdr, pdu } = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(buf.len(), 1);
            assert_eq!(hdr.transaction_id, TRANSACTION_ID);
            assert_eq!(hdr.unit_id, UNIT_ID);
            assert_eq!(pdu.0, Ok(Response::ReadHoldingRegisters(vec![0xABE0])));
        }

        #[test]
        fn decode_exception_message() {
            let mut codec = ClientCodec::default();
            let mut buf = BytesMut::from(
                &[
                    0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x66, 0x86, // exception = 0x80 + 0x06
                    0x02, 0x00,
                ][..],
            );
            let ResponseAdu { pdu, .. } = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(buf.len(), 1);
            assert_eq!(
                pdu.0,
                Err(ExceptionResponse {
                    function: FunctionCode::WriteSingleRegister,
                    exception: ExceptionCode::IllegalDataAddress,
                })
            );
        }

        #[test]
        fn decode_with_invalid_protocol_id() {
            let mut codec = ClientCodec::default();
            let mut buf = BytesMut::from(
                &[
                    0x00, 0x00, 0x33, // protocol id HI
                    0x12, // protocol id LO
                    0x00, 0x03, 0x66, 0x86, 0x02,
                ][..],
            );
            let err = codec.decode(&mut buf).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::InvalidData);
        }

        #[test]
        fn decode_with_invalid_length() {
            let mut codec = ClientCodec::default();
            let mut buf = BytesMut::from(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x66][..]);
            let err = codec.decode(&mut buf).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::InvalidData);
        }

        #[test]
        fn encode_write_request() {
            let mut codec = ClientCodec::default();
            let mut buf = BytesMut::new();
            let hdr = Header {
                transaction_id: TRANSACTION_ID,
                unit_id: UNIT_ID,
            };
            let pdu = Request::WriteSingleRegister(0x01, 0x0001).into();
            codec.encode(RequestAdu { hdr, pdu }, &mut buf).unwrap();
            assert_eq!(
                &buf[..],
                &[0x15, 0x01, 0x00, 0x00, 0x00, 0x06, 0xFF, 0x06, 0x00, 0x01, 0x00, 0x01]
            );
        }
    }

    mod server {
        use super::*;

        #[test]
        fn decode_read_request() {
            let mut codec = ServerCodec::default();
            let mut buf = BytesMut::from(
                &[
                    0x15, 0x01, 0x00, 0x00, 0x00, 0x06, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x01,
                ][..],
            );
            let RequestAdu { hdr, pdu } = codec.decode(&mut buf).unwrap().unwrap();
            assert!(buf.is_empty());
            assert_eq!(hdr.transaction_id, TRANSACTION_ID);
            assert_eq!(pdu.0, Request::ReadHoldingRegisters(0x00, 1));
        }

        #[test]
        fn decode_two_pipelined_requests() {
            let mut codec = ServerCodec::default();
            let mut buf = BytesMut::from(
                &[
                    0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x01, //
                    0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0xFF, 0x06, 0x00, 0x01, 0x00, 0x00,
                ][..],
            );
            let first = codec.decode(&mut buf).unwrap().unwrap();
            let second = codec.decode(&mut buf).unwrap().unwrap();
            assert!(codec.decode(&mut buf).unwrap().is_none());
            assert_eq!(first.hdr.transaction_id, 1);
            assert_eq!(second.pdu.0, Request::WriteSingleRegister(0x01, 0));
        }

        #[test]
        fn encode_exception_response() {
            let mut codec = ServerCodec::default();
            let mut buf = BytesMut::new();
            let hdr = Header {
                transaction_id: TRANSACTION_ID,
                unit_id: UNIT_ID,
            };
            let pdu = ExceptionResponse {
                function: FunctionCode::ReadHoldingRegisters,
                exception: ExceptionCode::IllegalDataAddress,
            }
            .into();
            codec.encode(ResponseAdu { hdr, pdu }, &mut buf).unwrap();
            assert_eq!(
                &buf[..],
                &[0x15, 0x01, 0x00, 0x00, 0x00, 0x03, 0xFF, 0x83, 0x02]
            );
        }

        #[test]
        fn encode_read_response() {
            let mut codec = ServerCodec::default();
            let mut buf = BytesMut::new();
            let hdr = Header {
                transaction_id: 0,
                unit_id: UNIT_ID,
            };
            let pdu = Response::ReadHoldingRegisters(vec![48_312, 1]).into();
            codec.encode(ResponseAdu { hdr, pdu }, &mut buf).unwrap();
            assert_eq!(
                &buf[..],
                &[0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0xFF, 0x03, 0x04, 0xBC, 0xB8, 0x00, 0x01]
            );
        }
    }
}
