// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TCP client connections

use std::{fmt, io, net::SocketAddr, time::Duration};

use futures_util::{SinkExt as _, StreamExt as _};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    time,
};
use tokio_util::codec::Framed;

use crate::{
    codec,
    frame::{tcp::*, *},
    Error, ProtocolError, Result,
};

use super::Context;

const INITIAL_TRANSACTION_ID: TransactionId = 0;

/// Establish a direct connection to a Modbus TCP coupler.
///
/// Connecting and every subsequent request/response exchange are bounded
/// by `timeout`.
pub async fn connect(
    socket_addr: SocketAddr,
    timeout: Duration,
) -> std::result::Result<Context, Error> {
    let transport = time::timeout(timeout, TcpStream::connect(socket_addr))
        .await
        .map_err(|_| Error::Timeout(timeout))??;
    Ok(attach(transport, timeout))
}

/// Attach a new client context to a transport connection.
pub fn attach<T>(transport: T, timeout: Duration) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    let client = Client::new(transport, timeout);
    Context {
        client: Box::new(client),
    }
}

/// Modbus TCP client
#[derive(Debug)]
pub(crate) struct Client<T> {
    framed: Framed<T, codec::tcp::ClientCodec>,
    unit_id: UnitId,
    transaction_id: TransactionId,
    timeout: Duration,
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(transport: T, timeout: Duration) -> Self {
        let framed = Framed::new(transport, codec::tcp::ClientCodec::default());
        Self {
            framed,
            unit_id: TCP_DEVICE_UNIT_ID,
            transaction_id: INITIAL_TRANSACTION_ID,
            timeout,
        }
    }

    fn next_request_hdr(&mut self) -> Header {
        let transaction_id = self.transaction_id;
        self.transaction_id = transaction_id.wrapping_add(1);
        Header {
            transaction_id,
            unit_id: self.unit_id,
        }
    }

    /// Send a request and wait for the response with the same transaction id.
    ///
    /// Late responses to requests that have timed out before are skipped.
    async fn exchange(&mut self, req_adu: RequestAdu) -> io::Result<ResponseAdu> {
        let transaction_id = req_adu.hdr.transaction_id;
        self.framed.send(req_adu).await?;
        loop {
            let res_adu = self.framed.next().await.unwrap_or_else(|| {
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                ))
            })?;
            if res_adu.hdr.transaction_id == transaction_id {
                return Ok(res_adu);
            }
            log::debug!("Dropping stale response {:?}", res_adu.hdr);
        }
    }

    pub(crate) async fn call(&mut self, req: Request) -> Result<Response> {
        log::debug!("Call {req:?}");
        let req_function = req.function_code();
        let req_hdr = self.next_request_hdr();
        let req_adu = RequestAdu {
            hdr: req_hdr,
            pdu: req.into(),
        };

        let timeout = self.timeout;
        let res_adu = time::timeout(timeout, self.exchange(req_adu))
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        verify_response_header(&req_hdr, &res_adu.hdr)?;
        match res_adu.pdu.0 {
            Ok(rsp) => {
                verify_function_code(req_function, rsp.function_code())?;
                Ok(Ok(rsp))
            }
            Err(ExceptionResponse {
                function,
                exception,
            }) => {
                verify_function_code(req_function, function)?;
                Ok(Err(exception))
            }
        }
    }
}

#[async_trait::async_trait]
impl<T> super::Client for Client<T>
where
    T: fmt::Debug + AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn call(&mut self, req: Request) -> Result<Response> {
        Client::call(self, req).await
    }
}

/// Check that `req_hdr` is the same `Header` as `rsp_hdr`.
fn verify_response_header(req_hdr: &Header, rsp_hdr: &Header) -> std::result::Result<(), Error> {
    if req_hdr != rsp_hdr {
        return Err(ProtocolError::HeaderMismatch {
            expected: format!("{req_hdr:?}"),
            actual: format!("{rsp_hdr:?}"),
        }
        .into());
    }
    Ok(())
}

fn verify_function_code(
    expected: FunctionCode,
    actual: FunctionCode,
) -> std::result::Result<(), Error> {
    if expected != actual {
        return Err(ProtocolError::FunctionCodeMismatch { expected, actual }.into());
    }
    Ok(())
}
