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

//! Operator Console
//!
//! Administrative command interpreter for the virtual machine host.
//!
//! - Command names match case-insensitively and may be abbreviated down to a
//!   per-command minimum (`CPU` for `CPUTYPE`); some commands require the
//!   full name
//! - A failing command produces one diagnostic line and never ends the loop
//! - `SHUTDOWN CONFIRMED` is the only way to leave an interactive loop early
//!
//! | Command         | Shortest form | Effect                                |
//! |-----------------|---------------|---------------------------------------|
//! | `SHAREDCKDC`    | full name     | register a shared CKD disk            |
//! | `CPUTYPE`       | `CPU`         | show or set the default CPU type      |
//! | `SHUTDOWN`      | full name     | stop everything (needs `CONFIRMED`)   |
//! | `PS2PDFCOMMAND` | full name     | set the PostScript to PDF converter   |
//! | `SESSIONS`      | `SESS`        | list active terminal sessions         |
//! | `HELP`          | `HE`          | list commands                         |

mod command;
mod console;
mod cpu;
mod error;
pub mod matcher;
mod registrar;

pub use command::CommandLine;
pub use console::{Flow, InputSource, OperatorConsole, Reply};
pub use cpu::{CpuTypeRegistry, KNOWN_CPU_TYPES, KnownCpuTypes};
pub use error::{CommandError, CommandResult, RegistrarError, UnknownCpuType};
pub use registrar::{SharedDisk, SharedDiskRegistry, SharedResourceId, SharedResourceRegistrar};
