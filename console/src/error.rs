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

use thiserror::Error;
use vmhost_service::DeviceAddress;

/// Result type for operator commands
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Failure of a single operator command
///
/// Every variant is reported on one line and never ends the console loop.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Malformed or out-of-range literal
    #[error("invalid argument '{literal}': {reason}")]
    InvalidArgument {
        /// The offending text
        literal: String,
        /// Why it was rejected
        reason: String,
    },

    /// A required operand was not given
    #[error("missing argument {0}")]
    MissingArgument(&'static str),

    /// The command was understood but refused
    #[error("{0}")]
    Rejected(String),

    /// CPU type validation failed
    #[error(transparent)]
    CpuType(#[from] UnknownCpuType),

    /// The shared resource registrar refused the specification
    #[error(transparent)]
    Registrar(#[from] RegistrarError),
}

impl CommandError {
    /// Build an [`CommandError::InvalidArgument`]
    pub fn invalid_argument(literal: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            literal: literal.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error stems from operator input rather than a collaborator
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            CommandError::InvalidArgument { .. } | CommandError::MissingArgument(_)
        )
    }
}

/// A CPU type not in the known model table
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown CPU type '{requested}' (known types: {known})")]
pub struct UnknownCpuType {
    /// The rejected CPU type
    pub requested: String,
    /// Comma separated list of accepted types
    pub known: String,
}

/// Rejections from a shared resource registrar
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrarError {
    /// User id is not a valid virtual machine name
    #[error("invalid user id '{0}' (1 to 8 characters)")]
    InvalidUser(String),

    /// Base file specification is unusable
    #[error("invalid base file specification '{0}'")]
    InvalidBaseFile(String),

    /// The device address is already in use
    #[error("device {0} is already defined")]
    DuplicateDevice(DeviceAddress),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommandError::invalid_argument("ZZZ", "not a hexadecimal number");
        assert_eq!(
            err.to_string(),
            "invalid argument 'ZZZ': not a hexadecimal number"
        );
        assert!(err.is_argument_error());

        let err = CommandError::MissingArgument("<cuu>");
        assert_eq!(err.to_string(), "missing argument <cuu>");

        let err: CommandError =
            RegistrarError::DuplicateDevice(DeviceAddress::new(0x191).unwrap()).into();
        assert_eq!(err.to_string(), "device 191 is already defined");
        assert!(!err.is_argument_error());
    }
}
