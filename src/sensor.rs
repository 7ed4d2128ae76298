// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temperature sources for the server.

use std::{
    io::{self, Error, ErrorKind},
    path::{Path, PathBuf},
};

use async_trait::async_trait;

use crate::Word;

/// A temperature in milli-degrees Celsius.
pub type MilliCelsius = i32;

/// Asynchronous source of temperature readings.
#[async_trait]
pub trait TemperatureSensor: Send + Sync {
    /// Take a single reading.
    async fn read_temperature(&self) -> io::Result<MilliCelsius>;
}

/// A Linux thermal zone exposed through sysfs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    /// The thermal zone of the CPU on most single board computers.
    pub const DEFAULT_PATH: &'static str = "/sys/class/thermal/thermal_zone0/temp";

    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ThermalZone {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}

#[async_trait]
impl TemperatureSensor for ThermalZone {
    async fn read_temperature(&self) -> io::Result<MilliCelsius> {
        log::debug!("Reading temperature from {}", self.path.display());
        let contents = tokio::fs::read_to_string(&self.path).await?;
        parse_millidegrees(&contents)
    }
}

/// Parse the first line of a sysfs temperature file.
fn parse_millidegrees(contents: &str) -> io::Result<MilliCelsius> {
    let line = contents.lines().next().unwrap_or_default().trim();
    line.parse().map_err(|err| {
        Error::new(
            ErrorKind::InvalidData,
            format!("failed to parse temperature {line:?}: {err}"),
        )
    })
}

/// Convert a reading into a register value.
///
/// Readings outside of `0..=65535` saturate at the bounds.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_register(value: MilliCelsius) -> Word {
    value.clamp(0, MilliCelsius::from(Word::MAX)) as Word
}
