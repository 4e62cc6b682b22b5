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

//! Host configuration
//!
//! [`HostConfig`] holds the settings fixed at process start. The two
//! settings operators may change at runtime live in [`RuntimeSettings`],
//! which is shared by reference between the operator console and the
//! session creation path.
//!
//! # Example
//!
//! ```
//! use vmhost_service::HostConfig;
//!
//! let config = HostConfig::new("127.0.0.1:3270".parse().unwrap())
//!     .with_cpu_type("4381")
//!     .with_min_color_count(7);
//! assert!(config.validate().is_ok());
//! ```

use crate::{MAX_SLOTS, Result, ServiceError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

/// Default CPU model for new logons
pub const DEFAULT_CPU_TYPE: &str = "4381";

/// Default external PostScript to PDF conversion command
pub const DEFAULT_PS2PDF_COMMAND: &str = "ps2pdf";

/// Host configuration fixed at process start
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Address the connection acceptor listens on
    pub bind_address: SocketAddr,

    /// Only accept terminal types from the predefined model list
    pub stick_to_predefined_terminal_types: bool,

    /// Minimum number of colors a terminal must report to be treated as a
    /// color device
    pub min_color_count: u16,

    /// Initial default CPU type
    pub cpu_type: String,

    /// Initial ps2pdf conversion command
    pub ps2pdf_command: String,

    /// Operator command script executed before interactive input
    pub startup_script: Option<PathBuf>,

    /// Most terminal sessions served at once
    pub max_sessions: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3270)),
            stick_to_predefined_terminal_types: true,
            min_color_count: 4,
            cpu_type: DEFAULT_CPU_TYPE.to_string(),
            ps2pdf_command: DEFAULT_PS2PDF_COMMAND.to_string(),
            startup_script: None,
            max_sessions: MAX_SLOTS,
        }
    }
}

impl HostConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Listen port
    pub fn listen_port(&self) -> u16 {
        self.bind_address.port()
    }

    /// Restrict negotiation to predefined terminal types
    pub fn with_stick_to_predefined_terminal_types(mut self, enabled: bool) -> Self {
        self.stick_to_predefined_terminal_types = enabled;
        self
    }

    /// Set the minimum color count
    pub fn with_min_color_count(mut self, count: u16) -> Self {
        self.min_color_count = count;
        self
    }

    /// Set the initial CPU type
    pub fn with_cpu_type(mut self, cpu_type: impl Into<String>) -> Self {
        self.cpu_type = cpu_type.into();
        self
    }

    /// Set the initial ps2pdf command
    pub fn with_ps2pdf_command(mut self, command: impl Into<String>) -> Self {
        self.ps2pdf_command = command.into();
        self
    }

    /// Set the startup script
    pub fn with_startup_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.startup_script = Some(path.into());
        self
    }

    /// Set the session limit
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Negotiation inputs derived from this configuration
    pub fn negotiation_policy(&self) -> NegotiationPolicy {
        NegotiationPolicy {
            stick_to_predefined_terminal_types: self.stick_to_predefined_terminal_types,
            min_color_count: self.min_color_count,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cpu_type.trim().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "cpu_type must not be empty".to_string(),
            ));
        }

        if self.ps2pdf_command.trim().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "ps2pdf_command must not be empty".to_string(),
            ));
        }

        if self.min_color_count == 0 {
            return Err(ServiceError::InvalidConfig(
                "min_color_count must be greater than 0".to_string(),
            ));
        }

        if self.max_sessions == 0 || self.max_sessions > MAX_SLOTS {
            return Err(ServiceError::InvalidConfig(format!(
                "max_sessions must be between 1 and {MAX_SLOTS}"
            )));
        }

        Ok(())
    }
}

/// Policy inputs handed to the terminal negotiator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationPolicy {
    /// Only accept predefined terminal models
    pub stick_to_predefined_terminal_types: bool,
    /// Minimum colors for a color terminal
    pub min_color_count: u16,
}

/// Operator-mutable configuration
///
/// Each field sits behind its own lock; no invariant spans fields. Sessions
/// read the values once at creation, so a change only affects sessions
/// started afterwards.
#[derive(Debug)]
pub struct RuntimeSettings {
    cpu_type_default: RwLock<String>,
    ps2pdf_command: RwLock<String>,
}

impl RuntimeSettings {
    /// Create settings seeded from the host configuration
    pub fn new(config: &HostConfig) -> Self {
        Self {
            cpu_type_default: RwLock::new(config.cpu_type.clone()),
            ps2pdf_command: RwLock::new(config.ps2pdf_command.clone()),
        }
    }

    /// Current default CPU type
    pub fn cpu_type_default(&self) -> String {
        self.cpu_type_default
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the default CPU type
    pub fn set_cpu_type_default(&self, cpu_type: impl Into<String>) {
        *self
            .cpu_type_default
            .write()
            .unwrap_or_else(PoisonError::into_inner) = cpu_type.into();
    }

    /// Current ps2pdf command
    pub fn ps2pdf_command(&self) -> String {
        self.ps2pdf_command
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the ps2pdf command
    pub fn set_ps2pdf_command(&self, command: impl Into<String>) {
        *self
            .ps2pdf_command
            .write()
            .unwrap_or_else(PoisonError::into_inner) = command.into();
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::new(&HostConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.listen_port(), 3270);
        assert!(config.stick_to_predefined_terminal_types);
        assert_eq!(config.cpu_type, DEFAULT_CPU_TYPE);
        assert!(config.startup_script.is_none());
        assert_eq!(config.max_sessions, 0xFF0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = HostConfig::new("0.0.0.0:2323".parse().unwrap())
            .with_stick_to_predefined_terminal_types(false)
            .with_min_color_count(7)
            .with_ps2pdf_command("/usr/bin/ps2pdf")
            .with_startup_script("startup.cmd");

        assert_eq!(config.listen_port(), 2323);
        assert_eq!(
            config.negotiation_policy(),
            NegotiationPolicy {
                stick_to_predefined_terminal_types: false,
                min_color_count: 7,
            }
        );
        assert_eq!(config.ps2pdf_command, "/usr/bin/ps2pdf");
        assert_eq!(config.startup_script, Some(PathBuf::from("startup.cmd")));
    }

    #[test]
    fn test_validation() {
        assert!(HostConfig::default().with_cpu_type(" ").validate().is_err());
        assert!(HostConfig::default().with_ps2pdf_command("").validate().is_err());
        assert!(HostConfig::default().with_min_color_count(0).validate().is_err());
        assert!(HostConfig::default().with_max_sessions(0).validate().is_err());
        assert!(HostConfig::default().with_max_sessions(MAX_SLOTS + 1).validate().is_err());
        assert!(HostConfig::default().with_max_sessions(MAX_SLOTS).validate().is_ok());
    }

    #[test]
    fn test_runtime_settings() {
        let settings = RuntimeSettings::new(&HostConfig::default().with_cpu_type("3033"));
        assert_eq!(settings.cpu_type_default(), "3033");

        settings.set_cpu_type_default("4341");
        settings.set_ps2pdf_command("gs-ps2pdf --quiet");
        assert_eq!(settings.cpu_type_default(), "4341");
        assert_eq!(settings.ps2pdf_command(), "gs-ps2pdf --quiet");
    }
}
