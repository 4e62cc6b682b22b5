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


//! VM Host
//!
//! Listens for terminal connections and reads operator commands from
//! standard input.
//!
//! ## Usage
//!
//! ```bash
//! vmhost --port 3270 --script startup.cmd
//! ```
//!
//! Then connect with:
//! ```bash
//! telnet localhost 3270
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vmhost_console::SharedDiskRegistry;
use vmhost_server::{BasicSessionFactory, Host, MetricsReporter};
use vmhost_service::{
    DEFAULT_CPU_TYPE, DEFAULT_PS2PDF_COMMAND, FixedModeNegotiator, HostConfig, MAX_SLOTS,
    TerminalMode,
};

/// Time allowed for blocked stdin readers once the host has shut down
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "vmhost")]
#[command(about = "Multi-session virtual machine host with an operator console")]
#[command(version)]
struct Cli {
    /// Interface to accept terminal connections on
    #[arg(long, env = "VMHOST_BIND", default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Port to accept terminal connections on
    #[arg(short, long, env = "VMHOST_PORT", default_value_t = 3270)]
    port: u16,

    /// Operator command script run before interactive input
    #[arg(short, long, env = "VMHOST_SCRIPT", value_name = "FILE")]
    script: Option<PathBuf>,

    /// Initial default CPU type for new logons
    #[arg(long, env = "VMHOST_CPU_TYPE", default_value = DEFAULT_CPU_TYPE)]
    cpu_type: String,

    /// Initial PostScript to PDF conversion command
    #[arg(long, env = "VMHOST_PS2PDF", default_value = DEFAULT_PS2PDF_COMMAND)]
    ps2pdf_command: String,

    /// Mode every terminal is admitted in
    #[arg(long, value_enum, default_value_t = ModeArg::LineMode)]
    mode: ModeArg,

    /// Accept terminal types outside the predefined model list
    #[arg(long)]
    any_terminal_type: bool,

    /// Minimum color count for a terminal to count as a color device
    #[arg(long, default_value_t = 4)]
    min_colors: u16,

    /// Most terminal sessions served at once
    #[arg(long, env = "VMHOST_MAX_SESSIONS", default_value_t = MAX_SLOTS)]
    max_sessions: usize,

    /// Seconds between session statistics log records (0 disables)
    #[arg(long, env = "VMHOST_STATS_INTERVAL", default_value_t = 300)]
    stats_interval: u64,

    /// Log filter, overrides RUST_LOG (e.g. "debug" or "vmhost_service=trace")
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    FullScreen,
    LineMode,
}

impl From<ModeArg> for TerminalMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::FullScreen => TerminalMode::FullScreen,
            ModeArg::LineMode => TerminalMode::LineMode,
        }
    }
}

impl Cli {
    fn host_config(&self) -> HostConfig {
        let mut config = HostConfig::new(SocketAddr::new(self.bind, self.port))
            .with_stick_to_predefined_terminal_types(!self.any_terminal_type)
            .with_min_color_count(self.min_colors)
            .with_cpu_type(self.cpu_type.clone())
            .with_ps2pdf_command(self.ps2pdf_command.clone())
            .with_max_sessions(self.max_sessions);
        if let Some(script) = &self.script {
            config = config.with_startup_script(script);
        }
        config
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        match &self.log_level {
            Some(filter) => EnvFilter::try_new(filter)
                .with_context(|| format!("invalid log filter '{filter}'")),
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Operator replies go to stdout, so log records go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(cli.env_filter()?)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let result = runtime.block_on(serve(cli));
    // A blocked stdin read cannot be cancelled
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    result
}

async fn serve(cli: Cli) -> Result<()> {
    let config = cli.host_config();
    let address = config.bind_address;

    let host = Host::bind_with(
        config,
        Arc::new(FixedModeNegotiator::new(cli.mode.into())),
        Arc::new(BasicSessionFactory),
        Arc::new(SharedDiskRegistry::new()),
    )
    .await
    .with_context(|| format!("failed to bring up host on {address}"))?;

    if cli.stats_interval > 0 {
        host.register_service(MetricsReporter::spawn(
            host.server().metrics(),
            Duration::from_secs(cli.stats_interval),
        ));
    }

    host.start().context("failed to start terminal acceptor")?;

    if let Err(e) = host.run_startup_script().await {
        host.shutdown().await;
        let script = cli.script.unwrap_or_default();
        return Err(e).with_context(|| format!("failed to run startup script {}", script.display()));
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Unable to listen for interrupt signal");
            std::future::pending::<()>().await;
        }
    };

    host.run(stdin, &mut stdout, interrupt)
        .await
        .context("operator console failed")?;

    let snapshot = host.server().metrics().snapshot();
    info!(
        opened = snapshot.sessions_opened,
        closed = snapshot.sessions_closed,
        force_stopped = snapshot.sessions_force_stopped,
        rejected = snapshot.sessions_rejected,
        uptime_secs = snapshot.uptime.as_secs(),
        "VM host stopped"
    );
    Ok(())
}
