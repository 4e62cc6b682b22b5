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

//! Periodic session statistics logging

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vmhost_service::{BackgroundService, SessionMetrics};

/// Background service logging a metrics snapshot at a fixed interval
pub struct MetricsReporter {
    stop: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsReporter {
    /// Start reporting `metrics` every `interval`
    pub fn spawn(metrics: Arc<SessionMetrics>, interval: Duration) -> Arc<Self> {
        let stop = CancellationToken::new();
        let task = tokio::spawn(report_loop(metrics, interval, stop.clone()));
        Arc::new(Self {
            stop,
            task: Mutex::new(Some(task)),
        })
    }
}

async fn report_loop(metrics: Arc<SessionMetrics>, interval: Duration, stop: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately
    ticker.tick().await;
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = metrics.snapshot();
                info!(
                    live = snapshot.live_sessions(),
                    opened = snapshot.sessions_opened,
                    closed = snapshot.sessions_closed,
                    negotiation_failures = snapshot.negotiation_failures,
                    rejected = snapshot.sessions_rejected,
                    accept_errors = snapshot.accept_errors,
                    avg_session_secs = snapshot.avg_session_duration.as_secs(),
                    "Session statistics"
                );
            }
        }
    }
    debug!("Metrics reporter exited");
}

#[async_trait]
impl BackgroundService for MetricsReporter {
    fn name(&self) -> &str {
        "metrics-reporter"
    }

    async fn stop(&self) {
        self.stop.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_reports_until_stopped() {
        let metrics = Arc::new(SessionMetrics::new());
        metrics.session_opened();
        let reporter = MetricsReporter::spawn(metrics, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(logs_contain("Session statistics"));

        reporter.stop().await;
        assert!(reporter.task.lock().unwrap().is_none());
        assert!(logs_contain("Metrics reporter exited"));

        // Stopping again is harmless
        reporter.stop().await;
    }
}
