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

//! Session Lifecycle Service
//!
//! This crate hosts concurrent terminal sessions, each bound to one emulated
//! terminal line of a virtual machine host:
//!
//! - Connections are admitted one at a time and negotiated into a
//!   full-screen or line-mode console
//! - Each session occupies the lowest free registry slot, which determines
//!   its device address (`slot + 0x010`)
//! - Every session runs on its own task and frees its slot when it ends
//! - Shutdown stops the acceptor, then all sessions, then background services
//!
//! # Architecture
//!
//! ```text
//! ShutdownCoordinator
//!     ↓
//! SessionServer (accept loop) → Negotiator
//!     ↓
//! SessionRegistry → SessionHandle → SessionConsole
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vmhost_service::{
//!     FixedModeNegotiator, HostConfig, NegotiatedTerminal, Result, RuntimeSettings,
//!     SessionFactory, SessionParams, SessionServer, ShutdownCoordinator, TerminalMode,
//!     TerminalSession,
//! };
//! use async_trait::async_trait;
//!
//! struct Hangup;
//!
//! #[async_trait]
//! impl TerminalSession for Hangup {
//!     async fn run_session_loop(&self) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn request_stop(&self) {}
//! }
//!
//! struct HangupFactory;
//!
//! impl SessionFactory for HangupFactory {
//!     fn full_screen(&self, _: NegotiatedTerminal, _: SessionParams) -> Box<dyn TerminalSession> {
//!         Box::new(Hangup)
//!     }
//!
//!     fn line_mode(&self, _: NegotiatedTerminal, _: SessionParams) -> Box<dyn TerminalSession> {
//!         Box::new(Hangup)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = HostConfig::new("127.0.0.1:3270".parse().unwrap());
//!     let settings = Arc::new(RuntimeSettings::new(&config));
//!     let server = Arc::new(
//!         SessionServer::bind(
//!             config,
//!             settings,
//!             Arc::new(FixedModeNegotiator::new(TerminalMode::LineMode)),
//!             Arc::new(HangupFactory),
//!         )
//!         .await?,
//!     );
//!     server.start()?;
//!
//!     let coordinator = ShutdownCoordinator::new(server);
//!     coordinator.shutdown().await;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod metrics;
mod negotiator;
mod registry;
mod server;
mod session;
mod shutdown;
mod terminal;
mod types;

pub use config::{
    DEFAULT_CPU_TYPE, DEFAULT_PS2PDF_COMMAND, HostConfig, NegotiationPolicy, RuntimeSettings,
};
pub use error::{Result, ServiceError};
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use negotiator::{FixedModeNegotiator, NegotiatedTerminal, Negotiator};
pub use registry::{SessionRegistry, SlotTable};
pub use server::{ConnectionListener, SessionServer};
pub use session::SessionHandle;
pub use shutdown::{BackgroundService, ShutdownCoordinator, ShutdownReport};
pub use terminal::{SessionConsole, SessionFactory, SessionParams, TerminalSession};
pub use types::{
    BASE_DEVICE_ADDRESS, DeviceAddress, MAX_DEVICE_ADDRESS, MAX_SLOTS, SlotIndex, TerminalMode,
};
