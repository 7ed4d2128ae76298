// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP server

use std::{io, net::SocketAddr};

use futures_util::{SinkExt as _, StreamExt as _};
use socket2::{Domain, Socket, Type};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};
use tokio_util::codec::Framed;

use crate::{
    codec,
    control::ControlFlags,
    frame::{tcp::*, *},
    registers::RegisterMap,
    sensor::{to_register, TemperatureSensor},
    Error,
};

use super::{ServiceBudget, Terminated};

/// Pending connections beyond the active session.
const LISTEN_BACKLOG: i32 = 1;

/// Outcome of a single client session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Session {
    /// Requests answered within this session.
    requests: u32,
    terminated: Option<Terminated>,
}

/// Serves the register map to one client at a time.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    budget: ServiceBudget,
    registers: RegisterMap,
    flags: ControlFlags,
}

impl Server {
    /// Open a listening socket on `addr`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let listener = listener(addr).map_err(|source| Error::Listen { addr, source })?;
        Ok(Self::new(listener))
    }

    /// Serve on an already bound listener with the default [`ServiceBudget`].
    #[must_use]
    pub fn new(listener: TcpListener) -> Self {
        Self {
            listener,
            budget: ServiceBudget::default(),
            registers: RegisterMap::new(),
            flags: ControlFlags::default(),
        }
    }

    /// Replace the ceilings on connections and requests.
    #[must_use]
    pub fn with_budget(mut self, budget: ServiceBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    #[must_use]
    pub const fn registers(&self) -> &RegisterMap {
        &self.registers
    }

    #[must_use]
    pub const fn control_flags(&self) -> ControlFlags {
        self.flags
    }

    #[must_use]
    pub const fn budget(&self) -> &ServiceBudget {
        &self.budget
    }

    /// Accept and serve connections one after another until a ceiling is hit.
    ///
    /// Returns `Ok` once more requests have been answered than the budget
    /// allows, and [`Error::ConnectionCeiling`] as soon as one connection too
    /// many has been accepted.
    pub async fn serve<S>(mut self, sensor: &S) -> Result<Terminated, Error>
    where
        S: TemperatureSensor + ?Sized,
    {
        loop {
            log::info!("Waiting for a client connection...");
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    log::error!("Failed to accept connection: {err}");
                    continue;
                }
            };
            let connections = self.budget.record_connection()?;
            log::info!("Client {peer} connected");
            log::debug!("Number of connections: {connections}");

            let framed = Framed::new(stream, codec::tcp::ServerCodec::default());
            let session = self.process(framed, sensor).await;
            log::info!(
                "Closing connection to {peer} after {} request(s)",
                session.requests
            );
            if let Some(terminated) = session.terminated {
                log::info!("Number of requests has exceeded maximum allowable, shutting down");
                return Ok(terminated);
            }
        }
    }

    /// The request-response loop of a single session.
    async fn process<T, S>(
        &mut self,
        mut framed: Framed<T, codec::tcp::ServerCodec>,
        sensor: &S,
    ) -> Session
    where
        T: AsyncRead + AsyncWrite + Unpin,
        S: TemperatureSensor + ?Sized,
    {
        let mut session = Session::default();
        loop {
            let request = match framed.next().await {
                Some(Ok(request)) => request,
                Some(Err(err)) if err.kind() == io::ErrorKind::ConnectionReset => {
                    log::info!("Client disconnected gracefully");
                    return session;
                }
                Some(Err(err)) => {
                    log::error!("Failed to receive request: {err}");
                    return session;
                }
                // tcp socket closed
                None => {
                    log::info!("Client disconnected");
                    return session;
                }
            };

            let hdr = request.hdr;
            let response = self.handle(request.into(), sensor).await;
            if let Err(err) = framed.send(ResponseAdu { hdr, pdu: response }).await {
                log::error!("Failed to send response: {err}");
                return session;
            }

            session.requests += 1;
            session.terminated = self.budget.record_request();
            log::info!("End of client request No: {}", self.budget.total_requests());
            if session.terminated.is_some() {
                return session;
            }
        }
    }

    async fn handle<S>(&mut self, request: Request, sensor: &S) -> ResponsePdu
    where
        S: TemperatureSensor + ?Sized,
    {
        match &request {
            Request::ReadHoldingRegisters(..) => {
                log::debug!("Received read holding registers request");
                self.refresh_temperature(sensor).await;
            }
            Request::WriteSingleRegister(..) => {
                log::debug!("Received write single register request");
            }
            Request::WriteMultipleRegisters(..) => {
                log::debug!("Received write multiple registers request");
            }
            Request::Custom(code, _) => {
                log::debug!("Received unknown request (function code: 0x{code:02X})");
            }
        }

        let result = self.registers.apply(&request);
        if let (Ok(_), Request::WriteSingleRegister(CONTROL_REGISTER, value)) = (&result, &request)
        {
            self.react(*value);
        }
        result
            .map_err(|exception| ExceptionResponse {
                function: request.function_code(),
                exception,
            })
            .into()
    }

    async fn refresh_temperature<S>(&mut self, sensor: &S)
    where
        S: TemperatureSensor + ?Sized,
    {
        match sensor.read_temperature().await {
            Ok(millidegrees) => {
                self.registers.set_temperature(to_register(millidegrees));
                log::debug!(
                    "Updated temperature register: {}",
                    self.registers.temperature()
                );
            }
            Err(err) => {
                log::error!(
                    "Failed to read temperature, keeping {}: {err}",
                    self.registers.temperature()
                );
            }
        }
    }

    fn react(&mut self, value: Word) {
        self.flags = ControlFlags::from_register(value);
        log::debug!("Updated control register: {value}");
        if self.flags.stop_requested {
            log::info!("Stop request received, stopping process");
        } else {
            log::info!("Start request received, starting/continuing process");
        }
    }
}

/// Start TCP listener - configure and open TCP socket
fn listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    TcpListener::from_std(socket.into())
}
