// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Start/stop semantics of the control register.

use std::fmt;

use crate::Word;

/// The decision carried by the control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlIntent {
    /// Any register value other than `1`.
    Stop,
    /// Register value `1`.
    Start,
}

impl ControlIntent {
    /// Interpret a control register value; anything but `1` fails safe to [`Self::Stop`].
    #[must_use]
    pub const fn from_register(value: Word) -> Self {
        if value == 1 {
            Self::Start
        } else {
            Self::Stop
        }
    }

    /// The value the client writes for this intent.
    #[must_use]
    pub const fn register_value(self) -> Word {
        match self {
            Self::Stop => 0,
            Self::Start => 1,
        }
    }
}

impl fmt::Display for ControlIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => f.write_str("stop"),
            Self::Start => f.write_str("start"),
        }
    }
}

/// Safety flags the server derives from the control register.
///
/// Exactly one of both flags is set once the first write has been received.
/// Nothing is actuated by them yet, they are only reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlags {
    pub stop_requested: bool,
    pub start_requested: bool,
}

impl ControlFlags {
    /// Derive the flags from a freshly written control register value.
    #[must_use]
    pub const fn from_register(value: Word) -> Self {
        match ControlIntent::from_register(value) {
            ControlIntent::Start => Self {
                stop_requested: false,
                start_requested: true,
            },
            ControlIntent::Stop => Self {
                stop_requested: true,
                start_requested: false,
            },
        }
    }

    /// The intent currently requested, if any write has been received yet.
    #[must_use]
    pub const fn intent(&self) -> Option<ControlIntent> {
        match (self.start_requested, self.stop_requested) {
            (true, _) => Some(ControlIntent::Start),
            (false, true) => Some(ControlIntent::Stop),
            (false, false) => None,
        }
    }
}
