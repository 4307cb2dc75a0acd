//! Pseudo-terminal process sessions with line-oriented output streaming.
//!
//! The runner is spawned on a pty so that it line-buffers its output, giving
//! live feedback instead of one block at exit. stdout and stderr share the pty,
//! so lines arrive in emission order.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use portable_pty::{CommandBuilder, PtySize, native_pty_system};
use tracing::{debug, error, instrument, warn};

use crate::core::invocation::Invocation;
use crate::core::types::ExitInfo;

/// Linux reports `EIO` on the pty master once every slave handle is closed.
const EIO: i32 = 5;

/// Abstraction over process launch, so orchestration can be tested with
/// scripted output.
pub trait SessionLauncher {
    /// Run `invocation` to completion, calling `on_line` for every output line
    /// (without the line terminator) in emission order.
    ///
    /// Returns the exit status collected after end of stream. An `Err` means the
    /// session could not be started, so no process (and no pid) exists.
    fn launch(&self, invocation: &Invocation, on_line: &mut dyn FnMut(&str)) -> Result<ExitInfo>;
}

/// Launches invocations on a native pseudo-terminal.
#[derive(Debug, Clone)]
pub struct PtyLauncher {
    /// Working directory for the child process.
    pub workdir: PathBuf,
    /// Terminal width reported to the child.
    pub cols: u16,
}

impl PtyLauncher {
    pub fn new(workdir: PathBuf, cols: u16) -> Self {
        Self { workdir, cols }
    }
}

impl SessionLauncher for PtyLauncher {
    #[instrument(skip_all, fields(program = invocation.program()))]
    fn launch(&self, invocation: &Invocation, on_line: &mut dyn FnMut(&str)) -> Result<ExitInfo> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: 24,
                cols: self.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("open pty")?;

        let mut cmd = CommandBuilder::new(invocation.program());
        cmd.args(invocation.args());
        cmd.cwd(&self.workdir);

        debug!("spawning child process");
        let mut child = match pair.slave.spawn_command(cmd) {
            Ok(child) => child,
            Err(e) => {
                error!(err = %e, "failed to spawn command");
                return Err(e).context("spawn command");
            }
        };
        let pid = child.process_id();
        // The slave must be closed on our side for end of stream to be observed.
        drop(pair.slave);

        let reader = pair.master.try_clone_reader().context("clone pty reader")?;
        let exit = stream_session(reader, on_line, || match child.wait() {
            Ok(status) => {
                let code = status.exit_code();
                match status.signal() {
                    Some(signal) => {
                        debug!(?pid, code, signal, "child terminated by signal");
                        ExitInfo::killed(pid, code, signal)
                    }
                    None => {
                        debug!(?pid, code, "child exited");
                        ExitInfo::exited(pid, code)
                    }
                }
            }
            Err(e) => {
                warn!(?pid, err = %e, "failed to collect child exit status");
                ExitInfo::missing(pid)
            }
        });
        Ok(exit)
    }
}

/// Stream `reader` into `on_line`, then collect the exit status with `wait`.
///
/// A read failure only cuts the output short: it is logged and the exit status
/// is still collected, so the verdict can fall back to it.
pub fn stream_session<R: Read>(
    reader: R,
    on_line: &mut dyn FnMut(&str),
    wait: impl FnOnce() -> ExitInfo,
) -> ExitInfo {
    if let Err(e) = read_lines(reader, on_line) {
        warn!(err = %format!("{e:#}"), "pty read failed, waiting for child");
    }
    wait()
}

/// Read `reader` line by line until end of stream.
///
/// Both a zero-length read and `EIO` from a closed pty end the stream. Bytes are
/// decoded as lossy UTF-8 and the trailing `\n` / `\r\n` is stripped. A final
/// unterminated line is still delivered.
pub fn read_lines<R: Read>(reader: R, on_line: &mut dyn FnMut(&str)) -> Result<usize> {
    let mut buf_reader = BufReader::new(reader);
    let mut count = 0usize;
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = match buf_reader.read_until(b'\n', &mut line) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.raw_os_error() == Some(EIO) => {
                // read_until keeps bytes read before the error.
                line.len()
            }
            Err(e) => return Err(e).context("read line"),
        };
        if n == 0 {
            break;
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches('\n').trim_end_matches('\r');
        on_line(text);
        count += 1;
    }

    debug!(lines = count, "output stream ended");
    Ok(count)
}
