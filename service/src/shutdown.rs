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

//! Shutdown coordination
//!
//! Shutdown runs in a fixed order: the acceptor first, so no session can be
//! registered behind the coordinator's back, then every live session, then
//! the registered background services. Session stops are fire-and-forget;
//! a worker may still be unwinding when the coordinator moves on.

use crate::{ServiceError, SessionServer};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// A subordinate service stopped after all sessions
#[async_trait]
pub trait BackgroundService: Send + Sync + 'static {
    /// Name used in log records
    fn name(&self) -> &str;

    /// Stop the service
    async fn stop(&self);
}

/// What a shutdown run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions that were asked to stop
    pub sessions_stopped: usize,
    /// Background services that were stopped
    pub services_stopped: usize,
}

/// Orchestrates system-wide shutdown
pub struct ShutdownCoordinator {
    server: Arc<SessionServer>,
    services: Mutex<Vec<Arc<dyn BackgroundService>>>,
    completed: AtomicBool,
}

impl ShutdownCoordinator {
    /// Create a coordinator for `server`
    pub fn new(server: Arc<SessionServer>) -> Self {
        Self {
            server,
            services: Mutex::new(Vec::new()),
            completed: AtomicBool::new(false),
        }
    }

    /// Register a service to be stopped after the sessions
    pub fn register_service(&self, service: Arc<dyn BackgroundService>) {
        debug!(service = service.name(), "Registered background service");
        self.services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(service);
    }

    /// Check if shutdown has already run
    pub fn is_shut_down(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Shut the host down
    ///
    /// Runs the stop sequence once. Later calls return `None` without doing
    /// anything.
    pub async fn shutdown(&self) -> Option<ShutdownReport> {
        if self.completed.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already performed");
            return None;
        }

        info!("System shutdown initiated");

        match self.server.stop().await {
            Ok(()) => {}
            Err(ServiceError::NotRunning) => debug!("Acceptor was not running"),
            Err(e) => warn!(error = %e, "Failed to stop acceptor"),
        }

        // Stop calls happen outside the registry lock.
        let sessions = self.server.registry().live();
        for (slot, handle) in &sessions {
            info!(slot = %slot, device = %slot.device_address(), "Stopping session");
            handle.request_stop();
        }

        let services: Vec<_> = self
            .services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        join_all(services.iter().map(|service| async move {
            info!(service = service.name(), "Stopping background service");
            service.stop().await;
        }))
        .await;

        info!(
            sessions = sessions.len(),
            services = services.len(),
            "System shutdown complete"
        );

        Some(ShutdownReport {
            sessions_stopped: sessions.len(),
            services_stopped: services.len(),
        })
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("server", &self.server)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
