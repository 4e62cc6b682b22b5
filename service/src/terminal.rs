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

//! Terminal console contracts
//!
//! The host does not interpret anything a terminal user types. It only needs
//! to start a session loop, ask it to stop, and know which variant was
//! chosen. Concrete consoles are supplied through a [`SessionFactory`].

use crate::{DeviceAddress, NegotiatedTerminal, Result, SlotIndex, TerminalMode};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A terminal console driving one session
///
/// # Example
///
/// ```no_run
/// use vmhost_service::{Result, TerminalSession};
/// use async_trait::async_trait;
///
/// struct IdleSession;
///
/// #[async_trait]
/// impl TerminalSession for IdleSession {
///     async fn run_session_loop(&self) -> Result<()> {
///         Ok(())
///     }
///
///     fn request_stop(&self) {}
/// }
/// ```
#[async_trait]
pub trait TerminalSession: Send + Sync + 'static {
    /// Run the session from logon through logoff
    ///
    /// Returns when the user logs off or the terminal disconnects.
    async fn run_session_loop(&self) -> Result<()>;

    /// Ask the session loop to end
    ///
    /// Must not block. The loop may still be running when this returns.
    fn request_stop(&self);
}

/// Values captured for a session at creation time
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// Registry slot of the session
    pub slot: SlotIndex,
    /// CPU model for the virtual machine logging on through this terminal
    pub cpu_type: String,
    /// Cancelled when the session is asked to stop
    pub stop: CancellationToken,
}

impl SessionParams {
    /// Device address derived from the slot
    pub fn device_address(&self) -> DeviceAddress {
        self.slot.device_address()
    }
}

/// Builds console implementations for negotiated terminals
pub trait SessionFactory: Send + Sync + 'static {
    /// Create a full-screen terminal session
    fn full_screen(
        &self,
        terminal: NegotiatedTerminal,
        params: SessionParams,
    ) -> Box<dyn TerminalSession>;

    /// Create a line-mode terminal session
    fn line_mode(&self, terminal: NegotiatedTerminal, params: SessionParams)
    -> Box<dyn TerminalSession>;
}

/// Console variant bound to a session
///
/// Selected once from the negotiated mode and never changed afterwards.
pub enum SessionConsole {
    /// Full-screen terminal session
    FullScreen(Box<dyn TerminalSession>),
    /// Line-mode terminal session
    LineMode(Box<dyn TerminalSession>),
}

impl SessionConsole {
    /// Create the console variant matching the negotiated mode
    pub fn create(
        factory: &dyn SessionFactory,
        terminal: NegotiatedTerminal,
        params: SessionParams,
    ) -> Self {
        match terminal.mode {
            TerminalMode::FullScreen => Self::FullScreen(factory.full_screen(terminal, params)),
            TerminalMode::LineMode => Self::LineMode(factory.line_mode(terminal, params)),
        }
    }

    /// Negotiated mode of this console
    pub fn mode(&self) -> TerminalMode {
        match self {
            Self::FullScreen(_) => TerminalMode::FullScreen,
            Self::LineMode(_) => TerminalMode::LineMode,
        }
    }

    fn session(&self) -> &dyn TerminalSession {
        match self {
            Self::FullScreen(session) | Self::LineMode(session) => session.as_ref(),
        }
    }

    /// Run the underlying session loop
    pub async fn run_session_loop(&self) -> Result<()> {
        self.session().run_session_loop().await
    }

    /// Forward a stop request to the underlying session
    pub fn request_stop(&self) {
        self.session().request_stop()
    }
}

impl std::fmt::Debug for SessionConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionConsole").field(&self.mode()).finish()
    }
}
