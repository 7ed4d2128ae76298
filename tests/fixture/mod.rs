// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{io, net::SocketAddr, time::Duration};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use thermal_modbus::{
    sensor::{MilliCelsius, TemperatureSensor},
    server::{Server, ServiceBudget, Terminated},
    Error,
};

pub const TIMEOUT: Duration = Duration::from_secs(2);

/// Always reports the same temperature.
#[derive(Debug, Clone, Copy)]
pub struct FixedSensor(pub MilliCelsius);

#[async_trait]
impl TemperatureSensor for FixedSensor {
    async fn read_temperature(&self) -> io::Result<MilliCelsius> {
        Ok(self.0)
    }
}

/// Bind a server on an ephemeral local port and serve in the background.
pub fn spawn_server(
    sensor: FixedSensor,
    budget: ServiceBudget,
) -> (SocketAddr, JoinHandle<Result<Terminated, Error>>) {
    let server = Server::bind("127.0.0.1:0".parse().unwrap())
        .unwrap()
        .with_budget(budget);
    let server_addr = server.local_addr().unwrap();
    let task = tokio::spawn(async move { server.serve(&sensor).await });
    (server_addr, task)
}
