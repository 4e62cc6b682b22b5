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


//! End-to-end host tests over loopback sockets

use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use vmhost_server::Host;
use vmhost_service::{BackgroundService, HostConfig, ServiceError};

#[derive(Default)]
struct CountingService {
    stops: AtomicUsize,
}

#[async_trait]
impl BackgroundService for CountingService {
    fn name(&self) -> &str {
        "counting"
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

struct Terminal {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Terminal {
    async fn connect(host: &Host) -> Self {
        let stream = TcpStream::connect(host.local_addr()).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("terminal read timed out")
            .unwrap()
    }
}

fn local_config() -> HostConfig {
    HostConfig::new("127.0.0.1:0".parse().unwrap())
}

async fn started_host(config: HostConfig) -> Host {
    let host = Host::bind(config).await.unwrap();
    host.start().unwrap();
    host
}

async fn wait_for_live(host: &Host, count: usize) {
    for _ in 0..200 {
        if host.server().registry().live_count() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {count} live sessions, found {}",
        host.server().registry().live_count()
    );
}

#[tokio::test]
async fn test_terminals_get_devices_and_cpu_type() {
    let host = started_host(local_config()).await;

    let mut first = Terminal::connect(&host).await;
    assert_eq!(
        first.recv().await.unwrap(),
        "VM HOST READY  DEVICE 010  CPU 4381"
    );
    first.send("hello there").await;
    assert_eq!(first.recv().await.unwrap(), "hello there");

    let mut second = Terminal::connect(&host).await;
    assert_eq!(
        second.recv().await.unwrap(),
        "VM HOST READY  DEVICE 011  CPU 4381"
    );

    // Only new logons see the changed CPU type
    host.console().execute("CPU 3033");
    let mut third = Terminal::connect(&host).await;
    assert_eq!(
        third.recv().await.unwrap(),
        "VM HOST READY  DEVICE 012  CPU 3033"
    );

    let listing = host.console().execute("SESSIONS").lines;
    assert_eq!(listing.len(), 4);
    assert!(listing[0].contains("device 010"));
    assert!(listing[0].contains("cpu 4381"));
    assert!(listing[0].contains("  up 00:00:"));
    assert!(listing[2].contains("cpu 3033"));
    assert_eq!(listing[3], "3 terminal session(s) active");

    // Logoff frees device 010 for the next terminal
    first.send("logoff").await;
    assert_eq!(first.recv().await.unwrap(), "LOGOFF COMPLETE");
    assert_eq!(first.recv().await, None);
    wait_for_live(&host, 2).await;

    let mut fourth = Terminal::connect(&host).await;
    assert_eq!(
        fourth.recv().await.unwrap(),
        "VM HOST READY  DEVICE 010  CPU 3033"
    );

    let report = host.shutdown().await.unwrap();
    assert_eq!(report.sessions_stopped, 3);

    for terminal in [&mut second, &mut third, &mut fourth] {
        assert_eq!(terminal.recv().await, None);
    }
    wait_for_live(&host, 0).await;
}

#[tokio::test]
async fn test_peer_disconnect_frees_device() {
    let host = started_host(local_config()).await;

    let mut first = Terminal::connect(&host).await;
    first.recv().await.unwrap();
    let mut second = Terminal::connect(&host).await;
    second.recv().await.unwrap();
    drop(first);
    wait_for_live(&host, 1).await;

    let mut third = Terminal::connect(&host).await;
    assert!(third.recv().await.unwrap().contains("DEVICE 010"));

    host.shutdown().await;
}

#[tokio::test]
async fn test_confirmed_shutdown_stops_everything_once() {
    let host = started_host(local_config()).await;
    let service = Arc::new(CountingService::default());
    host.register_service(service.clone());

    let mut terminal = Terminal::connect(&host).await;
    terminal.recv().await.unwrap();
    let address = host.local_addr();

    let mut output = Vec::new();
    let report = host
        .run(
            &b"SHUTDOWN\nSHUTDOWN CONFIRMED\nCPUTYPE 3033\n"[..],
            &mut output,
            std::future::pending(),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.sessions_stopped, 1);
    assert_eq!(report.services_stopped, 1);
    assert_eq!(service.stops.load(Ordering::SeqCst), 1);
    assert!(host.is_shut_down());
    assert!(!host.server().is_running());
    assert_eq!(host.settings().cpu_type_default(), "4381");

    let output = String::from_utf8(output).unwrap();
    assert!(output.starts_with("SHUTDOWN: "));
    assert!(output.ends_with("System shutdown initiated\n"));

    assert_eq!(terminal.recv().await, None);
    assert!(TcpStream::connect(address).await.is_err());

    assert!(host.shutdown().await.is_none());
    assert_eq!(service.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_operator_eof_waits_for_interrupt() {
    let host = Arc::new(started_host(local_config()).await);
    let (interrupt_tx, interrupt_rx) = oneshot::channel::<()>();

    let runner = {
        let host = host.clone();
        tokio::spawn(async move {
            let interrupt = async {
                let _ = interrupt_rx.await;
            };
            host.run(&b"CPUTYPE 3090\n"[..], &mut tokio::io::sink(), interrupt)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!host.is_shut_down());
    assert!(host.server().is_running());
    assert_eq!(host.settings().cpu_type_default(), "3090");

    interrupt_tx.send(()).unwrap();
    let report = runner.await.unwrap().unwrap();
    assert!(report.is_some());
    assert!(host.is_shut_down());
}

#[tokio::test]
async fn test_startup_script_cannot_shut_down() {
    let path = std::env::temp_dir().join(format!("vmhost-host-{}.script", std::process::id()));
    tokio::fs::write(
        &path,
        "CPUTYPE 3090\nSHUTDOWN CONFIRMED\nPS2PDFCOMMAND /opt/bin/ps2pdf -q\n",
    )
    .await
    .unwrap();

    let host = started_host(local_config().with_startup_script(&path)).await;
    let result = host.run_startup_script().await;
    let _ = tokio::fs::remove_file(&path).await;

    result.unwrap();
    assert!(!host.is_shut_down());
    assert!(host.server().is_running());
    assert_eq!(host.settings().cpu_type_default(), "3090");
    assert_eq!(host.settings().ps2pdf_command(), "/opt/bin/ps2pdf -q");

    host.shutdown().await;
}

#[tokio::test]
async fn test_missing_startup_script_is_an_error() {
    let host = started_host(
        local_config().with_startup_script("/nonexistent/vmhost/startup.script"),
    )
    .await;

    assert!(matches!(
        host.run_startup_script().await,
        Err(ServiceError::Io(_))
    ));
    host.shutdown().await;
}

#[tokio::test]
async fn test_unknown_initial_cpu_type_rejected() {
    let result = Host::bind(local_config().with_cpu_type("Z900")).await;
    assert!(matches!(result, Err(ServiceError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_bind_failure_is_fatal() {
    let first = started_host(local_config()).await;
    let result = Host::bind(HostConfig::new(first.local_addr())).await;

    assert!(matches!(result, Err(ServiceError::Bind { .. })));
    first.shutdown().await;
}

#[tokio::test]
async fn test_invalid_utf8_operator_line_is_not_fatal() {
    let host = started_host(local_config()).await;

    let mut output = Vec::new();
    let report = host
        .run(
            &b"CPUTYPE \xff\nCPUTYPE 3033\nSHUTDOWN CONFIRMED\n"[..],
            &mut output,
            std::future::pending(),
        )
        .await
        .unwrap();

    assert!(report.is_some());
    assert_eq!(host.settings().cpu_type_default(), "3033");
    assert!(host.is_shut_down());
    assert!(!host.server().is_running());
    assert!(String::from_utf8(output).unwrap().starts_with("CPUTYPE: "));
}

/// Operator output whose every write fails
struct BrokenOutput;

impl AsyncWrite for BrokenOutput {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_console_io_failure_still_shuts_down() {
    let host = started_host(local_config()).await;
    let mut terminal = Terminal::connect(&host).await;
    terminal.recv().await.unwrap();

    let result = host
        .run(&b"HELP\n"[..], &mut BrokenOutput, std::future::pending())
        .await;

    assert!(matches!(result, Err(ServiceError::Io(_))));
    assert!(host.is_shut_down());
    assert!(!host.server().is_running());
    assert_eq!(terminal.recv().await, None);
}
