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

//! Session handle and worker
//!
//! Each registered session runs its console loop on its own task. The
//! [`SessionHandle`] kept in the registry bundles what is needed to stop it:
//! the console, a cancellation token shared with the console, and an abort
//! handle for the task itself.
//!
//! The slot is released by a guard owned by the task, so it is freed both
//! when the loop returns and when the task is aborted. The same guard
//! records how the session ended, exactly once.

use crate::{DeviceAddress, SessionConsole, SessionMetrics, SessionRegistry, SlotIndex, TerminalMode};
use metrics::gauge;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A registered terminal session
pub struct SessionHandle {
    slot: SlotIndex,
    console: Arc<SessionConsole>,
    stop: CancellationToken,
    stop_requested: Arc<AtomicBool>,
    worker: AbortHandle,
    cpu_type: String,
    created_at: Instant,
}

impl SessionHandle {
    /// Start the worker for `console` bound to `slot`
    ///
    /// Intended to be called from inside
    /// [`SlotTable::allocate_with`](crate::SlotTable::allocate_with). The
    /// worker's slot release blocks on the registry lock until allocation has
    /// stored the handle, so a session that ends immediately still frees its
    /// slot after it was registered.
    pub fn spawn(
        slot: SlotIndex,
        console: SessionConsole,
        stop: CancellationToken,
        cpu_type: String,
        registry: Arc<SessionRegistry>,
        metrics: Arc<SessionMetrics>,
    ) -> Arc<Self> {
        let console = Arc::new(console);
        let created_at = Instant::now();
        let stop_requested = Arc::new(AtomicBool::new(false));
        let guard = SlotGuard {
            registry,
            slot,
            metrics,
            created_at,
            stop_requested: stop_requested.clone(),
        };
        let worker_console = console.clone();

        let task = tokio::spawn(async move {
            // Moved in before the first poll so an abort still releases the slot.
            let guard = guard;
            let result = worker_console.run_session_loop().await;
            let device = guard.slot.device_address();
            match result {
                Ok(()) => info!(slot = %guard.slot, device = %device, "Session ended"),
                Err(e) => warn!(slot = %guard.slot, device = %device, error = %e, "Session ended with error"),
            }
        });

        Arc::new(Self {
            slot,
            console,
            stop,
            stop_requested,
            worker: task.abort_handle(),
            cpu_type,
            created_at,
        })
    }

    /// Registry slot
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    /// Device address derived from the slot
    pub fn device_address(&self) -> DeviceAddress {
        self.slot.device_address()
    }

    /// Negotiated terminal mode
    pub fn mode(&self) -> TerminalMode {
        self.console.mode()
    }

    /// CPU type captured when the session was created
    pub fn cpu_type(&self) -> &str {
        &self.cpu_type
    }

    /// When the session was registered
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the session was registered
    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Check if the worker has finished
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Stop the session
    ///
    /// Cancels the session's token and forwards the request to the console,
    /// then aborts the worker in case the console ignores both. Returns
    /// without waiting: the worker may still be unwinding afterwards.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.stop.cancel();
        self.console.request_stop();
        self.worker.abort();
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("slot", &self.slot)
            .field("device", &self.device_address())
            .field("mode", &self.mode())
            .field("cpu_type", &self.cpu_type)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Releases a registry slot when the worker finishes or is dropped
///
/// A session that ends after [`SessionHandle::request_stop`] counts as force
/// stopped, whether its loop returned or the task was aborted.
struct SlotGuard {
    registry: Arc<SessionRegistry>,
    slot: SlotIndex,
    metrics: Arc<SessionMetrics>,
    created_at: Instant,
    stop_requested: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if self.stop_requested.load(Ordering::SeqCst) {
            self.metrics.session_force_stopped();
        } else {
            self.metrics.session_closed(self.created_at.elapsed());
        }
        self.registry.release(self.slot);
        gauge!("vmhost.sessions.active").decrement(1.0);
    }
}
