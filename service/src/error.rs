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

use std::net::SocketAddr;
use thiserror::Error;

/// Result type for session host operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors raised by the session host
#[derive(Debug, Error)]
pub enum ServiceError {
    /// I/O error from a socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The listening endpoint could not be bound
    #[error("Unable to listen on {address}: {source}")]
    Bind {
        /// Requested bind address
        address: SocketAddr,
        /// Underlying error
        source: std::io::Error,
    },

    /// Invalid host configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The acceptor has already been started
    #[error("Acceptor already running")]
    AlreadyRunning,

    /// The acceptor is not running
    #[error("Acceptor not running")]
    NotRunning,

    /// A terminal session ended with an error
    #[error("Session error: {0}")]
    Session(String),
}

impl ServiceError {
    /// Check if the error is recoverable
    ///
    /// Recoverable errors are transient conditions on a single connection or
    /// accept call; the host keeps serving after them.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ServiceError::Io(_) | ServiceError::Session(_))
    }

    /// Check if the error prevents the host from starting
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServiceError::Bind { .. } | ServiceError::InvalidConfig(_))
    }
}
