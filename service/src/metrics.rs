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

//! Lock-free session counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free session metrics
///
/// Every counter is an atomic and may be updated from any worker. The same
/// events are mirrored to the `metrics` facade by the callers.
#[derive(Debug)]
pub struct SessionMetrics {
    sessions_opened: AtomicU64,
    sessions_closed: AtomicU64,
    sessions_force_stopped: AtomicU64,
    sessions_rejected: AtomicU64,
    negotiation_failures: AtomicU64,
    accept_errors: AtomicU64,
    total_session_duration_ns: AtomicU64,
    started_at: Instant,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            sessions_opened: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            sessions_force_stopped: AtomicU64::new(0),
            sessions_rejected: AtomicU64::new(0),
            negotiation_failures: AtomicU64::new(0),
            accept_errors: AtomicU64::new(0),
            total_session_duration_ns: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record a session being registered
    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session loop returning
    pub fn session_closed(&self, duration: Duration) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
        self.total_session_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Record a session that ended because it was asked to stop
    pub fn session_force_stopped(&self) {
        self.sessions_force_stopped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection turned away because every slot was taken
    pub fn session_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection rejected by negotiation
    pub fn negotiation_failed(&self) {
        self.negotiation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed accept call
    pub fn accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Total sessions since start
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    /// Get a point-in-time view of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        let closed = self.sessions_closed.load(Ordering::Relaxed);
        let avg_session_duration = if closed == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_session_duration_ns.load(Ordering::Relaxed) / closed)
        };

        MetricsSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_closed: closed,
            sessions_force_stopped: self.sessions_force_stopped.load(Ordering::Relaxed),
            sessions_rejected: self.sessions_rejected.load(Ordering::Relaxed),
            negotiation_failures: self.negotiation_failures.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
            avg_session_duration,
        }
    }
}

/// A snapshot of session metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Sessions registered since start
    pub sessions_opened: u64,
    /// Sessions whose loop returned
    pub sessions_closed: u64,
    /// Sessions that ended after a stop request
    pub sessions_force_stopped: u64,
    /// Connections refused by a full registry
    pub sessions_rejected: u64,
    /// Connections discarded by negotiation
    pub negotiation_failures: u64,
    /// Failed accept calls
    pub accept_errors: u64,
    /// Time since the metrics were created
    pub uptime: Duration,
    /// Mean lifetime of closed sessions
    pub avg_session_duration: Duration,
}

impl MetricsSnapshot {
    /// Sessions opened but neither closed nor force-stopped
    pub fn live_sessions(&self) -> u64 {
        self.sessions_opened
            .saturating_sub(self.sessions_closed + self.sessions_force_stopped)
    }
}
