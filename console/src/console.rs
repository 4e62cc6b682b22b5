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

//! Operator console
//!
//! Reads administrative command lines and dispatches them through a fixed
//! command table. A failing command is reported on one line naming the
//! command; the loop always continues with the next line.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vmhost_console::{Flow, KnownCpuTypes, OperatorConsole, SharedDiskRegistry};
//! use vmhost_service::{RuntimeSettings, SessionRegistry};
//!
//! let settings = Arc::new(RuntimeSettings::default());
//! let console = OperatorConsole::new(
//!     settings.clone(),
//!     Arc::new(SessionRegistry::new()),
//!     Arc::new(KnownCpuTypes::new(settings.clone())),
//!     Arc::new(SharedDiskRegistry::new()),
//! );
//!
//! let reply = console.execute("ps2pdfcommand /opt/gs/bin/ps2pdf -dSAFER");
//! assert_eq!(reply.flow, Flow::Continue);
//! assert_eq!(settings.ps2pdf_command(), "/opt/gs/bin/ps2pdf -dSAFER");
//! ```

use crate::matcher::{is_abbrev, is_exact, parse_device_address};
use crate::{CommandError, CommandLine, CommandResult, CpuTypeRegistry, SharedResourceRegistrar};
use std::any::Any;
use std::borrow::Cow;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};
use vmhost_service::{RuntimeSettings, SessionRegistry};

/// Whether the console loop should keep running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command
    Continue,
    /// A confirmed shutdown was requested
    Shutdown,
}

/// Where operator lines come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// Live operator input; a confirmed shutdown ends the loop
    Interactive,
    /// Startup script; shutdown requests are ignored
    Script,
}

/// Output of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Lines to show the operator
    pub lines: Vec<String>,
    /// Loop control
    pub flow: Flow,
}

impl Reply {
    fn none() -> Self {
        Self {
            lines: Vec::new(),
            flow: Flow::Continue,
        }
    }

    fn line(text: impl Into<String>) -> Self {
        let mut reply = Self::none();
        reply.push(text);
        reply
    }

    fn push(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }
}

/// Handlers write into the reply as they go; lines pushed before an error
/// are kept ahead of the diagnostic.
type Handler = fn(&OperatorConsole, &CommandLine<'_>, &mut Reply) -> CommandResult<()>;

/// Entry of the dispatch table
struct CommandEntry {
    name: &'static str,
    /// Shortest accepted abbreviation; `None` requires the full name
    min_len: Option<usize>,
    usage: &'static str,
    handler: Handler,
}

impl CommandEntry {
    fn matches(&self, candidate: &str) -> bool {
        match self.min_len {
            Some(min_len) => is_abbrev(candidate, self.name, min_len),
            None => is_exact(candidate, self.name),
        }
    }
}

const COMMANDS: &[CommandEntry] = &[
    CommandEntry {
        name: "SHAREDCKDC",
        min_len: None,
        usage: "SHAREDCKDC <user> <cuu> <basefile>  register a shared CKD disk",
        handler: OperatorConsole::shared_ckdc,
    },
    CommandEntry {
        name: "CPUTYPE",
        min_len: Some(3),
        usage: "CPUTYPE [<type>]                    show or set the CPU type for new logons",
        handler: OperatorConsole::cpu_type,
    },
    CommandEntry {
        name: "SHUTDOWN",
        min_len: None,
        usage: "SHUTDOWN CONFIRMED                  stop all sessions and exit",
        handler: OperatorConsole::shutdown,
    },
    CommandEntry {
        name: "PS2PDFCOMMAND",
        min_len: None,
        usage: "PS2PDFCOMMAND <command...>          set the PostScript to PDF converter",
        handler: OperatorConsole::ps2pdf_command,
    },
    CommandEntry {
        name: "SESSIONS",
        min_len: Some(4),
        usage: "SESSIONS                            list active terminal sessions",
        handler: OperatorConsole::sessions,
    },
    CommandEntry {
        name: "HELP",
        min_len: Some(2),
        usage: "HELP                                show this summary",
        handler: OperatorConsole::help,
    },
];

/// Administrative command interpreter
pub struct OperatorConsole {
    settings: Arc<RuntimeSettings>,
    registry: Arc<SessionRegistry>,
    cpu_types: Arc<dyn CpuTypeRegistry>,
    registrar: Arc<dyn SharedResourceRegistrar>,
}

impl OperatorConsole {
    /// Create a console operating on the given shared state
    pub fn new(
        settings: Arc<RuntimeSettings>,
        registry: Arc<SessionRegistry>,
        cpu_types: Arc<dyn CpuTypeRegistry>,
        registrar: Arc<dyn SharedResourceRegistrar>,
    ) -> Self {
        Self {
            settings,
            registry,
            cpu_types,
            registrar,
        }
    }

    /// Execute one command line
    ///
    /// Never fails: errors, including panics raised by collaborators, are
    /// turned into a single diagnostic line.
    pub fn execute(&self, line: &str) -> Reply {
        let Some(command) = CommandLine::parse(line) else {
            return Reply::none();
        };

        let name = command.name();
        let Some(entry) = COMMANDS.iter().find(|entry| entry.matches(name)) else {
            debug!(command = name, "Invalid system command");
            return Reply::line(format!("invalid system command: {name}"));
        };

        debug!(command = entry.name, "Executing system command");
        let mut reply = Reply::none();
        match catch_unwind(AssertUnwindSafe(|| (entry.handler)(self, &command, &mut reply))) {
            Ok(Ok(())) => reply,
            Ok(Err(e)) => {
                warn!(command = entry.name, error = %e, "System command failed");
                reply.flow = Flow::Continue;
                reply.push(format!("{}: {e}", entry.name));
                reply
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(command = entry.name, error = %message, "System command aborted");
                Reply::line(format!("{}: unexpected failure: {message}", entry.name))
            }
        }
    }

    /// Run commands from `input` until it ends or a shutdown is confirmed
    ///
    /// Replies are written to `output`. Bytes that are not valid UTF-8 are
    /// replaced rather than ending the loop. With [`InputSource::Script`] a
    /// confirmed shutdown is ignored and the loop carries on. Returns
    /// [`Flow::Shutdown`] only when an interactive shutdown was confirmed,
    /// [`Flow::Continue`] when the input was exhausted.
    pub async fn run<R, W>(
        &self,
        mut input: R,
        output: &mut W,
        source: InputSource,
    ) -> std::io::Result<Flow>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut raw = Vec::new();
        loop {
            raw.clear();
            if input.read_until(b'\n', &mut raw).await? == 0 {
                break;
            }
            let line = decode_line(&raw);
            let reply = self.execute(&line);
            for text in &reply.lines {
                output.write_all(text.as_bytes()).await?;
                output.write_all(b"\n").await?;
            }
            output.flush().await?;

            if reply.flow == Flow::Shutdown {
                match source {
                    InputSource::Interactive => return Ok(Flow::Shutdown),
                    InputSource::Script => {
                        warn!(line = %line, "Shutdown request in startup script ignored")
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Run a startup script, discarding replies
    ///
    /// Replies still reach the log through the per-command tracing events.
    pub async fn run_script(&self, path: &Path) -> std::io::Result<()> {
        let file = File::open(path).await?;
        info!(script = %path.display(), "Running startup script");
        self.run(BufReader::new(file), &mut tokio::io::sink(), InputSource::Script)
            .await?;
        Ok(())
    }

    fn shared_ckdc(&self, command: &CommandLine<'_>, reply: &mut Reply) -> CommandResult<()> {
        let user = command.arg(0).ok_or(CommandError::MissingArgument("<user>"))?;
        let cuu = command.arg(1).ok_or(CommandError::MissingArgument("<cuu>"))?;
        let base_file = command
            .arg(2)
            .ok_or(CommandError::MissingArgument("<basefile>"))?;
        ignore_extra("SHAREDCKDC", command, 3, reply);
        let device = parse_device_address(cuu)?;

        let id = self
            .registrar
            .register_shared_resource(user, device, base_file)?;
        reply.push(format!(
            "Shared CKDC {device} for {} registered as {id}",
            user.to_ascii_uppercase()
        ));
        Ok(())
    }

    fn cpu_type(&self, command: &CommandLine<'_>, reply: &mut Reply) -> CommandResult<()> {
        let Some(requested) = command.arg(0) else {
            reply.push(format!(
                "Default CPU type: {}",
                self.cpu_types.default_cpu_type()
            ));
            return Ok(());
        };
        ignore_extra("CPUTYPE", command, 1, reply);

        let cpu_type = self.cpu_types.set_default_cpu_type(requested)?;
        info!(cpu_type = %cpu_type, "Default CPU type changed");
        reply.push(format!("Default CPU type set to {cpu_type}"));
        Ok(())
    }

    fn shutdown(&self, command: &CommandLine<'_>, reply: &mut Reply) -> CommandResult<()> {
        let confirmed = command.arg_count() == 1
            && command.arg(0).is_some_and(|arg| is_exact(arg, "CONFIRMED"));
        if !confirmed {
            return Err(CommandError::Rejected(
                "not shutting down, enter exactly 'SHUTDOWN CONFIRMED'".to_string(),
            ));
        }

        info!("Shutdown confirmed by operator");
        reply.push("System shutdown initiated");
        reply.flow = Flow::Shutdown;
        Ok(())
    }

    fn ps2pdf_command(&self, command: &CommandLine<'_>, reply: &mut Reply) -> CommandResult<()> {
        let value = command.remainder(0);
        if value.is_empty() {
            return Err(CommandError::MissingArgument("<command>"));
        }

        self.settings.set_ps2pdf_command(value);
        info!(command = %value, "ps2pdf command changed");
        reply.push(format!("ps2pdf command set to: {value}"));
        Ok(())
    }

    fn sessions(&self, _command: &CommandLine<'_>, reply: &mut Reply) -> CommandResult<()> {
        let live = self.registry.live();
        for (slot, handle) in &live {
            reply.push(format!(
                "  slot {:>3}  device {}  {:<11}  cpu {:<5}  up {}",
                slot.as_usize(),
                slot.device_address(),
                handle.mode().to_string(),
                handle.cpu_type(),
                format_uptime(handle.uptime())
            ));
        }
        reply.push(format!("{} terminal session(s) active", live.len()));
        Ok(())
    }

    fn help(&self, _command: &CommandLine<'_>, reply: &mut Reply) -> CommandResult<()> {
        reply.push("System commands:");
        reply
            .lines
            .extend(COMMANDS.iter().map(|entry| format!("  {}", entry.usage)));
        Ok(())
    }
}

/// Note parameters from position `from` onwards that the command does not use
fn ignore_extra(name: &str, command: &CommandLine<'_>, from: usize, reply: &mut Reply) {
    if command.arg_count() > from {
        let extra = command.remainder(from);
        warn!(command = name, extra = %extra, "Extra parameters ignored");
        reply.push(format!("{name}: extra parameters ignored: {extra}"));
    }
}

/// Decode one raw input line, dropping the line terminator
fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw)
}

/// `HH:MM:SS`, hours unbounded
fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

impl std::fmt::Debug for OperatorConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorConsole")
            .field("cpu_type", &self.settings.cpu_type_default())
            .field("ps2pdf_command", &self.settings.ps2pdf_command())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KnownCpuTypes, SharedDiskRegistry};
    use tracing_test::traced_test;

    fn console() -> (OperatorConsole, Arc<RuntimeSettings>) {
        let settings = Arc::new(RuntimeSettings::default());
        let console = OperatorConsole::new(
            settings.clone(),
            Arc::new(SessionRegistry::new()),
            Arc::new(KnownCpuTypes::new(settings.clone())),
            Arc::new(SharedDiskRegistry::new()),
        );
        (console, settings)
    }

    #[test]
    fn test_every_command_has_usage() {
        for entry in COMMANDS {
            assert!(entry.usage.starts_with(entry.name));
            assert!(entry.matches(entry.name));
            assert!(entry.matches(&entry.name.to_ascii_lowercase()));
        }
    }

    #[test]
    fn test_command_names_do_not_collide() {
        for entry in COMMANDS {
            let shortest = &entry.name[..entry.min_len.unwrap_or(entry.name.len())];
            let owners: Vec<_> = COMMANDS
                .iter()
                .filter(|other| other.matches(shortest))
                .map(|other| other.name)
                .collect();
            assert_eq!(owners, vec![entry.name]);
        }
    }

    #[test]
    fn test_decode_line_replaces_invalid_bytes() {
        assert_eq!(decode_line(b"CPUTYPE 3033\r\n"), "CPUTYPE 3033");
        assert_eq!(decode_line(b"HELP"), "HELP");
        assert_eq!(decode_line(b"CPUTYPE \xff\n"), "CPUTYPE \u{FFFD}");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(3725)), "01:02:05");
        assert_eq!(format_uptime(Duration::from_secs(100 * 3600)), "100:00:00");
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_script_shutdown_is_logged() {
        let (console, _) = console();
        let flow = console
            .run(
                &b"SHUTDOWN CONFIRMED\n"[..],
                &mut tokio::io::sink(),
                InputSource::Script,
            )
            .await
            .unwrap();

        assert_eq!(flow, Flow::Continue);
        assert!(logs_contain("Shutdown request in startup script ignored"));
    }

    #[test]
    #[traced_test]
    fn test_failure_is_logged() {
        let (console, _) = console();
        console.execute("CPUTYPE 9999");
        assert!(logs_contain("System command failed"));
    }
}
