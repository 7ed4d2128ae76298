// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validated settings for both roles.

use std::{
    io::{self, BufRead, Write},
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use thiserror::Error;

use crate::sensor::{MilliCelsius, ThermalZone};

/// The Modbus TCP port both roles use by default.
pub const DEFAULT_PORT: u16 = 1502;

/// Address of the monitored node on the default deployment network.
pub const DEFAULT_SERVER_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 137, 100), DEFAULT_PORT));

/// The server listens on all interfaces by default.
pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT));

/// Upper bound for connecting and for every request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Invalid settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid debug flag {0:?}, expected \"Y\" or \"N\"")]
    InvalidDebugFlag(String),

    #[error("invalid logging rate: {0}")]
    InvalidLogRate(i64),

    #[error("target temperature {0} °C is out of range, expected a value in (0, 150]")]
    TargetOutOfRange(i64),

    #[error("not a whole number: {0:?}")]
    InvalidNumber(String),
}

/// Enables verbose diagnostics, given as `Y` or `N` on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlag(bool);

impl DebugFlag {
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self(enabled)
    }

    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.0
    }
}

impl FromStr for DebugFlag {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Y" => Ok(Self(true)),
            "N" => Ok(Self(false)),
            other => Err(ConfigError::InvalidDebugFlag(other.to_owned())),
        }
    }
}

/// Poll period of the client in seconds, always within `[MIN, MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRate(u64);

impl LogRate {
    pub const MIN: u64 = 3;
    pub const MAX: u64 = 60;

    /// Force `seconds` into the valid range.
    #[must_use]
    pub fn clamped(seconds: u64) -> Self {
        Self(seconds.clamp(Self::MIN, Self::MAX))
    }

    /// Validate a command line value.
    ///
    /// Values that are not positive are rejected, all others are clamped.
    pub fn from_arg(seconds: i64) -> Result<Self, ConfigError> {
        let requested = u64::try_from(seconds)
            .ok()
            .filter(|seconds| *seconds > 0)
            .ok_or(ConfigError::InvalidLogRate(seconds))?;
        let rate = Self::clamped(requested);
        if rate.0 != requested {
            log::warn!(
                "Logging rate must be within [{}, {}] s, forced to {} s",
                Self::MIN,
                Self::MAX,
                rate.0
            );
        }
        Ok(rate)
    }

    #[must_use]
    pub const fn seconds(self) -> u64 {
        self.0
    }
}

/// Maximum allowable CPU temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetTemperature(MilliCelsius);

impl TargetTemperature {
    /// Highest accepted target in whole degrees Celsius.
    pub const MAX_DEGREES: i64 = 150;

    /// Accepts whole degrees Celsius in `(0, 150]`.
    pub fn from_degrees(degrees: i64) -> Result<Self, ConfigError> {
        if degrees <= 0 || degrees > Self::MAX_DEGREES {
            return Err(ConfigError::TargetOutOfRange(degrees));
        }
        let millidegrees = MilliCelsius::try_from(degrees * 1000)
            .map_err(|_| ConfigError::TargetOutOfRange(degrees))?;
        Ok(Self(millidegrees))
    }

    #[must_use]
    pub const fn millidegrees(self) -> MilliCelsius {
        self.0
    }

    /// Ask for the target on `output` until a valid value is read from `input`.
    pub fn prompt(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<Self> {
        write!(output, "Enter max allowable CPU temperature (degrees C): ")?;
        output.flush()?;
        let mut line = String::new();
        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "no target temperature entered",
                ));
            }
            let parsed = line
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidNumber(line.trim().to_owned()))
                .and_then(Self::from_degrees);
            match parsed {
                Ok(target) => return Ok(target),
                Err(err) => {
                    log::debug!("Rejected target temperature: {err}");
                    write!(
                        output,
                        "CPU temperature out of range\nPlease enter a value between 0 and {}: ",
                        Self::MAX_DEGREES
                    )?;
                    output.flush()?;
                }
            }
        }
    }
}

/// Settings of the monitored node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub sensor_path: PathBuf,
    pub debug: DebugFlag,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            sensor_path: ThermalZone::DEFAULT_PATH.into(),
            debug: DebugFlag::default(),
        }
    }
}

/// Settings of the monitoring node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    pub log_rate: LogRate,
    pub timeout: Duration,
    pub debug: DebugFlag,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR,
            log_rate: LogRate::clamped(LogRate::MIN),
            timeout: DEFAULT_TIMEOUT,
            debug: DebugFlag::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn parse_debug_flag() {
        assert_eq!("Y".parse(), Ok(DebugFlag::new(true)));
        assert_eq!("N".parse(), Ok(DebugFlag::new(false)));
        assert_eq!(
            "y".parse::<DebugFlag>(),
            Err(ConfigError::InvalidDebugFlag("y".into()))
        );
        assert!("YES".parse::<DebugFlag>().is_err());
    }

    #[test]
    fn clamp_log_rate() {
        assert_eq!(LogRate::from_arg(1).unwrap().seconds(), 3);
        assert_eq!(LogRate::from_arg(1000).unwrap().seconds(), 60);
        assert_eq!(LogRate::from_arg(3).unwrap().seconds(), 3);
        assert_eq!(LogRate::from_arg(17).unwrap().seconds(), 17);
        assert_eq!(LogRate::from_arg(60).unwrap().seconds(), 60);
    }

    #[test]
    fn reject_non_positive_log_rate() {
        assert_eq!(LogRate::from_arg(0), Err(ConfigError::InvalidLogRate(0)));
        assert_eq!(LogRate::from_arg(-4), Err(ConfigError::InvalidLogRate(-4)));
    }

    #[test]
    fn target_temperature_bounds() {
        assert!(TargetTemperature::from_degrees(0).is_err());
        assert!(TargetTemperature::from_degrees(151).is_err());
        assert_eq!(
            TargetTemperature::from_degrees(1).unwrap().millidegrees(),
            1_000
        );
        assert_eq!(
            TargetTemperature::from_degrees(150).unwrap().millidegrees(),
            150_000
        );
    }

    #[test]
    fn prompt_until_valid() {
        let mut input = Cursor::new("0\n151\nfifty\n150\n");
        let mut output = Vec::new();
        let target = TargetTemperature::prompt(&mut input, &mut output).unwrap();
        assert_eq!(target.millidegrees(), 150_000);

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Enter max allowable CPU temperature"));
        assert_eq!(output.matches("out of range").count(), 3);
    }

    #[test]
    fn prompt_at_end_of_input() {
        let mut input = Cursor::new("200\n");
        let err = TargetTemperature::prompt(&mut input, &mut io::sink()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_addr.port(), DEFAULT_PORT);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(
            ServerConfig::default().sensor_path,
            PathBuf::from(ThermalZone::DEFAULT_PATH)
        );
    }
}
