// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns noisy threshold crossings into a stable overload/normal decision.
//!
//! Every sample above the target increments a counter, every sample below
//! it decrements the counter. The counter saturates at [`COUNTER_MAX`].
//! Reaching [`OVERLOAD_THRESHOLD`] latches the overload state, which is only
//! released once the counter has dropped back to zero. In between the
//! previous decision is held.

use crate::{control::ControlIntent, sensor::MilliCelsius, Word};

/// Upper bound of the counter.
pub const COUNTER_MAX: u8 = 10;

/// Counter value from which on the temperature is considered too high.
pub const OVERLOAD_THRESHOLD: u8 = 3;

/// The latched decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalState {
    Overload,
    Normal,
}

impl ThermalState {
    /// Overload demands a stop, normal operation a start.
    #[must_use]
    pub const fn intent(self) -> ControlIntent {
        match self {
            Self::Overload => ControlIntent::Stop,
            Self::Normal => ControlIntent::Start,
        }
    }
}

/// State of a single control loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hysteresis {
    counter: u8,
    latched_overload: bool,
}

impl Hysteresis {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: 0,
            latched_overload: false,
        }
    }

    #[must_use]
    pub const fn counter(&self) -> u8 {
        self.counter
    }

    #[must_use]
    pub const fn state(&self) -> ThermalState {
        if self.latched_overload {
            ThermalState::Overload
        } else {
            ThermalState::Normal
        }
    }

    /// Feed one sample and return the resulting decision.
    pub fn evaluate(&mut self, sample: Word, target: MilliCelsius) -> ThermalState {
        let sample = MilliCelsius::from(sample);
        if sample > target {
            self.counter = (self.counter + 1).min(COUNTER_MAX);
        } else if sample < target {
            self.counter = self.counter.saturating_sub(1);
        }
        log::debug!(
            "Sample {sample} vs. target {target}: counter = {}",
            self.counter
        );

        if self.counter >= OVERLOAD_THRESHOLD {
            self.latched_overload = true;
        } else if self.counter == 0 {
            self.latched_overload = false;
        }
        self.state()
    }
}
