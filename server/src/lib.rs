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

//! VM Host Server
//!
//! Wires the session service and the operator console into a runnable host:
//!
//! - [`Host`] owns the acceptor, the operator console and the shutdown
//!   coordinator, all sharing one session registry and one set of runtime
//!   settings
//! - [`BasicLineSession`] is a minimal echoing terminal session used when no
//!   terminal emulator is plugged in
//! - [`MetricsReporter`] periodically logs session statistics and is stopped
//!   as a background service at shutdown
//!
//! # Example
//!
//! ```no_run
//! use vmhost_service::HostConfig;
//! use vmhost_server::Host;
//!
//! #[tokio::main]
//! async fn main() -> vmhost_service::Result<()> {
//!     let host = Host::bind(HostConfig::new("127.0.0.1:3270".parse().unwrap())).await?;
//!     host.start()?;
//!     host.run_startup_script().await?;
//!
//!     let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//!     let interrupt = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     host.run(stdin, &mut tokio::io::stdout(), interrupt).await?;
//!     Ok(())
//! }
//! ```

mod host;
mod reporter;
mod session;

pub use host::Host;
pub use reporter::MetricsReporter;
pub use session::{BasicLineSession, BasicSessionFactory, MAX_LINE_LENGTH};
