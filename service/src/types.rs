//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Core types for the session host

use std::fmt;

/// Device address of the first terminal line (slot 0).
pub const BASE_DEVICE_ADDRESS: u16 = 0x010;

/// Largest address representable with three hex digits.
pub const MAX_DEVICE_ADDRESS: u16 = 0xFFF;

/// Number of slots that map onto a distinct device address.
pub const MAX_SLOTS: usize = (MAX_DEVICE_ADDRESS - BASE_DEVICE_ADDRESS + 1) as usize;

/// Index of a session slot in the [`SessionRegistry`](crate::SessionRegistry).
///
/// Slot indices are reused: once a session ends its index becomes the
/// lowest free candidate for the next connection. Only indices below
/// [`MAX_SLOTS`] exist, so every slot has its own device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(u16);

impl SlotIndex {
    /// Create a slot index, rejecting indices without a device address
    pub fn new(index: usize) -> Option<Self> {
        if index < MAX_SLOTS {
            u16::try_from(index).ok().map(Self)
        } else {
            None
        }
    }

    /// Get the underlying index
    pub fn as_usize(&self) -> usize {
        usize::from(self.0)
    }

    /// Emulated terminal device address for this slot
    ///
    /// Always `slot + 0x010`. The address is derived, never stored.
    pub fn device_address(&self) -> DeviceAddress {
        // In range: the index is below MAX_SLOTS.
        DeviceAddress(BASE_DEVICE_ADDRESS + self.0)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 3-hex-digit control-unit/unit address (CUU)
///
/// Rendered as exactly three uppercase hexadecimal digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress(u16);

impl DeviceAddress {
    /// Create a device address, rejecting values wider than three hex digits
    pub fn new(value: u16) -> Option<Self> {
        (value <= MAX_DEVICE_ADDRESS).then_some(Self(value))
    }

    /// Get the numeric value
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03X}", self.0)
    }
}

/// Terminal mode determined by negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalMode {
    /// Block-mode, full-screen terminal session
    FullScreen,
    /// Line-by-line terminal session
    LineMode,
}

impl fmt::Display for TerminalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullScreen => write!(f, "full-screen"),
            Self::LineMode => write!(f, "line-mode"),
        }
    }
}
