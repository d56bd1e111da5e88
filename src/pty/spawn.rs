// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::ffi::CString;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, ForkResult, Pid};
use tokio::io::unix::AsyncFd;

use super::nbio::{read_chunk, set_nonblocking, write_all, PtyFd};

/// Outcome of a reaped child process.
#[derive(Debug, Clone, Copy)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// A pseudo-terminal hosting a spawned child process, reached through a
/// non-blocking master fd registered with tokio's reactor.
pub struct NativePty {
    master: AsyncFd<PtyFd>,
    child_pid: Pid,
    cols: Arc<AtomicU16>,
    rows: Arc<AtomicU16>,
    reaped: bool,
}

impl NativePty {
    /// Spawn `argv` on a freshly allocated PTY of size `cols`x`rows`, with
    /// the working directory and extra environment variables applied in
    /// the child before exec.
    // forkpty is unsafe: the child is partially initialized until exec.
    #[allow(unsafe_code)]
    pub fn spawn(
        argv: &[String],
        cols: u16,
        rows: u16,
        working_directory: Option<&str>,
        env: &[(&str, String)],
    ) -> anyhow::Result<Self> {
        if argv.is_empty() {
            bail!("argv must have at least one element");
        }

        let winsize = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // SAFETY: forkpty forks the process; the child branch below only
        // calls async-signal-safe operations (env/chdir/exec) before
        // replacing its image.
        let result = unsafe { forkpty(&winsize, None) }.context("forkpty failed")?;
        let ForkptyResult { master, fork_result } = result;

        match fork_result {
            ForkResult::Child => {
                if let Some(dir) = working_directory {
                    if std::env::set_current_dir(dir).is_err() {
                        std::process::exit(127);
                    }
                }
                for (key, value) in env {
                    std::env::set_var(key, value);
                }

                let c_args: Vec<CString> = match argv
                    .iter()
                    .map(|s| CString::new(s.as_bytes()))
                    .collect::<Result<_, _>>()
                {
                    Ok(args) => args,
                    Err(_) => std::process::exit(127),
                };

                let _ = execvp(&c_args[0], &c_args);
                // execvp only returns on error.
                std::process::exit(127);
            }
            ForkResult::Parent { child } => {
                set_nonblocking(&master)?;
                let afd = AsyncFd::new(PtyFd(master)).context("AsyncFd::new failed")?;
                Ok(Self {
                    master: afd,
                    child_pid: child,
                    cols: Arc::new(AtomicU16::new(cols)),
                    rows: Arc::new(AtomicU16::new(rows)),
                    reaped: false,
                })
            }
        }
    }

    /// Read up to `buf.len()` bytes from the master fd. `Ok(0)` means EOF;
    /// `EIO` (common when the child has already exited) is also surfaced
    /// as `Ok(0)` to the caller via the io::Error check at the call site.
    pub async fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        match read_chunk(&self.master, buf).await {
            Err(e) if e.raw_os_error() == Some(libc::EIO) => Ok(0),
            other => other,
        }
    }

    /// Write all of `data` to the master fd, retrying on `EAGAIN`.
    pub async fn write(&self, data: &[u8]) -> std::io::Result<()> {
        write_all(&self.master, data).await
    }

    // TIOCSWINSZ requires an unsafe ioctl call.
    #[allow(unsafe_code)]
    pub fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        self.cols.store(cols, Ordering::Relaxed);
        self.rows.store(rows, Ordering::Relaxed);

        let ws = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // SAFETY: TIOCSWINSZ is a well-defined ioctl on the PTY master fd
        // with a properly initialized Winsize argument.
        let ret = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if ret < 0 {
            bail!("TIOCSWINSZ ioctl failed: {}", std::io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn child_pid(&self) -> u32 {
        self.child_pid.as_raw() as u32
    }

    /// Send SIGHUP to the child's process group, wait briefly, then SIGKILL
    /// and reap. Idempotent.
    pub async fn close(&mut self) {
        if self.reaped {
            return;
        }
        let _ = kill(Pid::from_raw(-self.child_pid.as_raw()), Signal::SIGHUP);
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        if matches!(waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG)), Ok(WaitStatus::StillAlive)) {
            let _ = kill(self.child_pid, Signal::SIGKILL);
        }
        let pid = self.child_pid;
        let _ = tokio::task::spawn_blocking(move || wait_for_exit(pid)).await;
        self.reaped = true;
    }
}

impl Drop for NativePty {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        let _ = kill(self.child_pid, Signal::SIGHUP);
        std::thread::sleep(std::time::Duration::from_millis(50));
        let _ = kill(self.child_pid, Signal::SIGKILL);
        let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
    }
}

/// Block until the child exits. Used off the async runtime via
/// `spawn_blocking`.
fn wait_for_exit(pid: Pid) -> anyhow::Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus { code: Some(code), signal: None }),
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                return Ok(ExitStatus { code: None, signal: Some(sig as i32) })
            }
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => bail!("waitpid failed: {e}"),
        }
    }
}
