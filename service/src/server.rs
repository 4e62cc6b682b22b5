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

//! Connection acceptor
//!
//! The [`SessionServer`] owns the listening socket. Its accept loop admits one
//! connection at a time: negotiate the terminal type, build the console
//! variant, register it in the lowest free slot and start its worker. Only
//! then does it go back to waiting for the next connection.
//!
//! Stopping is signalled through a cancellation token raced against every
//! blocking step, so an intentional stop is never mistaken for an accept
//! error.

use crate::{
    HostConfig, Negotiator, Result, RuntimeSettings, ServiceError, SessionConsole, SessionFactory,
    SessionHandle, SessionMetrics, SessionParams, SessionRegistry, SlotIndex,
};
use async_trait::async_trait;
use metrics::{counter, gauge};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Source of inbound terminal connections
///
/// Implemented for [`TcpListener`]. Wrapping a listener lets callers observe
/// or alter what the accept loop sees.
#[async_trait]
pub trait ConnectionListener: Send + Sync + 'static {
    /// Wait for the next connection
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;

    /// Address the listener is bound to
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl ConnectionListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Network acceptor for terminal sessions
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use vmhost_service::{FixedModeNegotiator, HostConfig, RuntimeSettings, SessionFactory,
///     SessionServer, TerminalMode};
///
/// # async fn run(factory: Arc<dyn SessionFactory>) -> vmhost_service::Result<()> {
/// let config = HostConfig::new("127.0.0.1:3270".parse().unwrap());
/// let settings = Arc::new(RuntimeSettings::new(&config));
/// let server = SessionServer::bind(
///     config,
///     settings,
///     Arc::new(FixedModeNegotiator::new(TerminalMode::LineMode)),
///     factory,
/// )
/// .await?;
///
/// server.start()?;
/// // ... operator console runs here ...
/// server.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionServer {
    /// Host configuration
    config: HostConfig,
    /// Listening socket, moved into the accept loop on start
    listener: Mutex<Option<Box<dyn ConnectionListener>>>,
    /// Actual bind address
    bind_address: SocketAddr,
    /// Shared admission state
    admission: Arc<AdmissionContext>,
    /// Running flag
    running: AtomicBool,
    /// Cancelled to stop the accept loop
    shutdown: CancellationToken,
    /// Accept loop task handle
    accept_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Everything the accept loop needs to turn a socket into a session
struct AdmissionContext {
    config: HostConfig,
    registry: Arc<SessionRegistry>,
    settings: Arc<RuntimeSettings>,
    metrics: Arc<SessionMetrics>,
    negotiator: Arc<dyn Negotiator>,
    factory: Arc<dyn SessionFactory>,
}

impl SessionServer {
    /// Bind the listening endpoint
    ///
    /// Failing to bind is fatal for the host; the returned
    /// [`ServiceError::Bind`] names the address. Call [`start`](Self::start)
    /// to begin accepting connections.
    pub async fn bind(
        config: HostConfig,
        settings: Arc<RuntimeSettings>,
        negotiator: Arc<dyn Negotiator>,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_address)
            .await
            .map_err(|source| ServiceError::Bind {
                address: config.bind_address,
                source,
            })?;

        Self::with_listener(config, listener, settings, negotiator, factory)
    }

    /// Serve connections from an already bound listener
    pub fn with_listener<L: ConnectionListener>(
        config: HostConfig,
        listener: L,
        settings: Arc<RuntimeSettings>,
        negotiator: Arc<dyn Negotiator>,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<Self> {
        config.validate()?;
        let bind_address = listener.local_addr()?;

        info!("Session host bound to {}", bind_address);

        let admission = Arc::new(AdmissionContext {
            config: config.clone(),
            registry: Arc::new(SessionRegistry::with_limit(config.max_sessions)),
            settings,
            metrics: Arc::new(SessionMetrics::new()),
            negotiator,
            factory,
        });

        Ok(Self {
            config,
            listener: Mutex::new(Some(Box::new(listener))),
            bind_address,
            admission,
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            accept_handle: Mutex::new(None),
        })
    }

    /// Start the accept loop
    ///
    /// The loop runs on its own task until [`stop`](Self::stop) is called.
    /// A stopped server cannot be restarted.
    pub fn start(&self) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ServiceError::AlreadyRunning)?;
        self.running.store(true, Ordering::SeqCst);

        info!(port = self.bind_address.port(), "Accepting terminal connections");

        let handle = tokio::spawn(accept_loop(
            listener,
            self.admission.clone(),
            self.shutdown.clone(),
        ));

        *self
            .accept_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(())
    }

    /// Stop accepting connections
    ///
    /// Closes the listening endpoint and waits for the accept loop to exit.
    /// Live sessions are not touched.
    pub async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::NotRunning);
        }

        info!("Stopping connection acceptor");
        self.shutdown.cancel();

        let handle = self
            .accept_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Accept loop terminated abnormally");
            }
        }

        Ok(())
    }

    /// Check if the accept loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the server's bind address
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Get the session registry
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.admission.registry.clone()
    }

    /// Get the runtime settings read by session creation
    pub fn settings(&self) -> Arc<RuntimeSettings> {
        self.admission.settings.clone()
    }

    /// Get the session metrics
    pub fn metrics(&self) -> Arc<SessionMetrics> {
        self.admission.metrics.clone()
    }

    /// Get the host configuration
    pub fn config(&self) -> &HostConfig {
        &self.config
    }
}

impl std::fmt::Debug for SessionServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionServer")
            .field("bind_address", &self.bind_address)
            .field("running", &self.is_running())
            .field("sessions", &self.admission.registry.live_count())
            .finish()
    }
}

impl Drop for SessionServer {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            tracing::warn!("SessionServer dropped while still accepting");
            self.shutdown.cancel();
        }
    }
}

async fn accept_loop(
    listener: Box<dyn ConnectionListener>,
    admission: Arc<AdmissionContext>,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = listener.accept() => result,
        };

        match accepted {
            Ok((socket, peer_addr)) => {
                debug!("Accepted connection from {}", peer_addr);
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = admission.admit(socket, peer_addr) => {}
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
                admission.metrics.accept_error();
                counter!("vmhost.accept.errors").increment(1);

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                }
            }
        }
    }

    info!("Accept loop terminated");
}

impl AdmissionContext {
    /// Negotiate, register and start one session
    #[instrument(skip_all, fields(peer_addr = %peer_addr))]
    async fn admit(&self, socket: TcpStream, peer_addr: SocketAddr) -> Option<SlotIndex> {
        let policy = self.config.negotiation_policy();
        let Some(terminal) = self.negotiator.negotiate(socket, peer_addr, policy).await else {
            info!("Terminal negotiation failed, connection discarded");
            self.metrics.negotiation_failed();
            counter!("vmhost.negotiation.failures").increment(1);
            return None;
        };

        let mode = terminal.mode;
        let cpu_type = self.settings.cpu_type_default();

        let allocated = self.registry.allocate_with(|slot| {
            let stop = CancellationToken::new();
            let params = SessionParams {
                slot,
                cpu_type: cpu_type.clone(),
                stop: stop.clone(),
            };
            let console = SessionConsole::create(self.factory.as_ref(), terminal, params);
            let handle = SessionHandle::spawn(
                slot,
                console,
                stop,
                cpu_type.clone(),
                self.registry.clone(),
                self.metrics.clone(),
            );
            (handle, ())
        });

        // A full registry drops the terminal unused, closing the connection.
        let Some((slot, ())) = allocated else {
            warn!(
                limit = self.registry.limit(),
                "Session limit reached, connection closed"
            );
            self.metrics.session_rejected();
            counter!("vmhost.sessions.rejected").increment(1);
            return None;
        };

        self.metrics.session_opened();
        counter!("vmhost.sessions.total").increment(1);
        gauge!("vmhost.sessions.active").increment(1.0);

        info!(
            slot = %slot,
            device = %slot.device_address(),
            mode = %mode,
            cpu_type = %cpu_type,
            "Terminal session started"
        );

        Some(slot)
    }
}
