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

//! Application context

use crate::BasicSessionFactory;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{error, info};
use vmhost_console::{
    CpuTypeRegistry, Flow, InputSource, KnownCpuTypes, OperatorConsole, SharedDiskRegistry,
    SharedResourceRegistrar,
};
use vmhost_service::{
    BackgroundService, FixedModeNegotiator, HostConfig, Negotiator, Result, RuntimeSettings,
    ServiceError, SessionFactory, SessionServer, ShutdownCoordinator, ShutdownReport, TerminalMode,
};

/// Owns every long-lived component of the host
///
/// Created once at startup. The acceptor, the operator console and the
/// shutdown coordinator all share the same registry and runtime settings.
pub struct Host {
    server: Arc<SessionServer>,
    coordinator: ShutdownCoordinator,
    console: OperatorConsole,
    settings: Arc<RuntimeSettings>,
}

impl Host {
    /// Bind with the built-in collaborators
    ///
    /// Terminals are admitted in line mode and served by
    /// [`BasicSessionFactory`]; shared disks are kept in memory.
    pub async fn bind(config: HostConfig) -> Result<Self> {
        Self::bind_with(
            config,
            Arc::new(FixedModeNegotiator::new(TerminalMode::LineMode)),
            Arc::new(BasicSessionFactory),
            Arc::new(SharedDiskRegistry::new()),
        )
        .await
    }

    /// Bind with caller supplied collaborators
    ///
    /// The configured CPU type must be one of the known processor models.
    pub async fn bind_with(
        config: HostConfig,
        negotiator: Arc<dyn Negotiator>,
        factory: Arc<dyn SessionFactory>,
        registrar: Arc<dyn SharedResourceRegistrar>,
    ) -> Result<Self> {
        let settings = Arc::new(RuntimeSettings::new(&config));
        let cpu_types = Arc::new(KnownCpuTypes::new(settings.clone()));
        cpu_types
            .set_default_cpu_type(&config.cpu_type)
            .map_err(|e| ServiceError::InvalidConfig(e.to_string()))?;

        let server =
            Arc::new(SessionServer::bind(config, settings.clone(), negotiator, factory).await?);
        let console = OperatorConsole::new(
            settings.clone(),
            server.registry(),
            cpu_types,
            registrar,
        );
        let coordinator = ShutdownCoordinator::new(server.clone());

        Ok(Self {
            server,
            coordinator,
            console,
            settings,
        })
    }

    /// Start accepting terminal connections
    pub fn start(&self) -> Result<()> {
        self.server.start()
    }

    /// Address the acceptor is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.server.bind_address()
    }

    /// Session server
    pub fn server(&self) -> &Arc<SessionServer> {
        &self.server
    }

    /// Operator console
    pub fn console(&self) -> &OperatorConsole {
        &self.console
    }

    /// Runtime settings shared with the console
    pub fn settings(&self) -> &Arc<RuntimeSettings> {
        &self.settings
    }

    /// Register a service stopped after the sessions at shutdown
    pub fn register_service(&self, service: Arc<dyn BackgroundService>) {
        self.coordinator.register_service(service);
    }

    /// Run the configured startup script, if any
    ///
    /// Shutdown requests in the script are ignored.
    pub async fn run_startup_script(&self) -> Result<()> {
        if let Some(path) = &self.server.config().startup_script {
            self.console.run_script(path).await?;
        }
        Ok(())
    }

    /// Serve the operator until a shutdown is requested, then shut down
    ///
    /// Commands are read from `input` and replies written to `output`. When
    /// `input` ends without a confirmed shutdown the host keeps running until
    /// `interrupt` resolves. An interrupt received while the operator is
    /// still typing also shuts the host down. If reading `input` or writing
    /// `output` fails, the host is shut down before the error is returned.
    pub async fn run<R, W, F>(
        &self,
        input: R,
        output: &mut W,
        interrupt: F,
    ) -> Result<Option<ShutdownReport>>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);

        let flow = tokio::select! {
            flow = self.console.run(input, output, InputSource::Interactive) => Some(flow),
            _ = &mut interrupt => None,
        };

        match flow {
            Some(Ok(Flow::Shutdown)) => {}
            Some(Ok(Flow::Continue)) => {
                info!("Operator input closed, waiting for interrupt");
                interrupt.await;
                info!("Interrupt received");
            }
            Some(Err(e)) => {
                error!(error = %e, "Operator console failed");
                self.shutdown().await;
                return Err(e.into());
            }
            None => info!("Interrupt received"),
        }

        Ok(self.shutdown().await)
    }

    /// Shut down the host
    ///
    /// Returns `None` when the host was already shut down.
    pub async fn shutdown(&self) -> Option<ShutdownReport> {
        self.coordinator.shutdown().await
    }

    /// Check if the host has been shut down
    pub fn is_shut_down(&self) -> bool {
        self.coordinator.is_shut_down()
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("server", &self.server)
            .field("console", &self.console)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
