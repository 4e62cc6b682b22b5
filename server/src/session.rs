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

//! Built-in line-mode terminal session
//!
//! Stands in for the terminal emulator so the host is usable on its own: the
//! user is greeted with the device address and CPU type, every line is echoed
//! back, and `LOGOFF` ends the session.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vmhost_service::{
    DeviceAddress, NegotiatedTerminal, Result, ServiceError, SessionFactory, SessionParams,
    TerminalSession,
};

/// Longest input line accepted from a terminal
pub const MAX_LINE_LENGTH: usize = 1024;

/// Command that ends a session from the terminal side
const LOGOFF: &str = "LOGOFF";

enum Event {
    Stop,
    Line(Option<std::result::Result<String, LinesCodecError>>),
}

/// Echoing line-mode session
pub struct BasicLineSession {
    lines: Mutex<Framed<TcpStream, LinesCodec>>,
    device: DeviceAddress,
    cpu_type: String,
    peer_addr: SocketAddr,
    stop: CancellationToken,
}

impl BasicLineSession {
    /// Create a session on a negotiated terminal
    pub fn new(terminal: NegotiatedTerminal, params: SessionParams) -> Self {
        Self {
            lines: Mutex::new(Framed::new(
                terminal.stream,
                LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
            )),
            device: params.device_address(),
            cpu_type: params.cpu_type,
            peer_addr: terminal.peer_addr,
            stop: params.stop,
        }
    }
}

#[async_trait]
impl TerminalSession for BasicLineSession {
    async fn run_session_loop(&self) -> Result<()> {
        let mut lines = self.lines.lock().await;
        lines
            .send(format!(
                "VM HOST READY  DEVICE {}  CPU {}",
                self.device, self.cpu_type
            ))
            .await
            .map_err(codec_error)?;

        loop {
            let event = tokio::select! {
                biased;
                _ = self.stop.cancelled() => Event::Stop,
                line = lines.next() => Event::Line(line),
            };

            match event {
                Event::Stop => {
                    debug!(device = %self.device, "Line session stopped");
                    return Ok(());
                }
                Event::Line(None) => {
                    debug!(device = %self.device, peer_addr = %self.peer_addr, "Terminal disconnected");
                    return Ok(());
                }
                Event::Line(Some(Err(e))) => return Err(codec_error(e)),
                Event::Line(Some(Ok(line))) => {
                    if line.trim().eq_ignore_ascii_case(LOGOFF) {
                        info!(device = %self.device, "User logged off");
                        lines.send("LOGOFF COMPLETE").await.map_err(codec_error)?;
                        return Ok(());
                    }
                    lines.send(line).await.map_err(codec_error)?;
                }
            }
        }
    }

    fn request_stop(&self) {
        self.stop.cancel();
    }
}

fn codec_error(e: LinesCodecError) -> ServiceError {
    match e {
        LinesCodecError::Io(e) => ServiceError::Io(e),
        LinesCodecError::MaxLineLengthExceeded => {
            ServiceError::Session(format!("input line exceeds {MAX_LINE_LENGTH} bytes"))
        }
    }
}

/// Factory producing [`BasicLineSession`] for every terminal mode
///
/// Full-screen terminals get the same line-oriented dialogue.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicSessionFactory;

impl SessionFactory for BasicSessionFactory {
    fn full_screen(
        &self,
        terminal: NegotiatedTerminal,
        params: SessionParams,
    ) -> Box<dyn TerminalSession> {
        Box::new(BasicLineSession::new(terminal, params))
    }

    fn line_mode(
        &self,
        terminal: NegotiatedTerminal,
        params: SessionParams,
    ) -> Box<dyn TerminalSession> {
        Box::new(BasicLineSession::new(terminal, params))
    }
}
