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

//! Terminal-type negotiation contract

use crate::{NegotiationPolicy, TerminalMode};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// A connection that completed negotiation
#[derive(Debug)]
pub struct NegotiatedTerminal {
    /// Negotiated terminal mode
    pub mode: TerminalMode,
    /// Terminal model reported by the client, if any
    pub terminal_type: Option<String>,
    /// Remote peer address
    pub peer_addr: SocketAddr,
    /// Transport handed to the chosen console
    pub stream: TcpStream,
}

/// Decides whether a fresh connection is usable and in which mode
#[async_trait]
pub trait Negotiator: Send + Sync + 'static {
    /// Negotiate the terminal type of a new connection
    ///
    /// Returns `None` when the connection is unusable. The negotiator closes
    /// such connections itself; the caller does nothing further with them.
    async fn negotiate(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        policy: NegotiationPolicy,
    ) -> Option<NegotiatedTerminal>;
}

/// Negotiator that admits every connection in one fixed mode
#[derive(Debug, Clone, Copy)]
pub struct FixedModeNegotiator {
    mode: TerminalMode,
}

impl FixedModeNegotiator {
    /// Create a negotiator that always reports `mode`
    pub fn new(mode: TerminalMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl Negotiator for FixedModeNegotiator {
    async fn negotiate(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        _policy: NegotiationPolicy,
    ) -> Option<NegotiatedTerminal> {
        Some(NegotiatedTerminal {
            mode: self.mode,
            terminal_type: None,
            peer_addr,
            stream,
        })
    }
}
