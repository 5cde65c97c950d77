//! Low-level POSIX primitives shared by the launcher and the job
//! controller: process-group assignment, terminal foreground hand-off, and
//! a stop-aware group wait.
//!
//! Everything here is Unix-only; this shell is not meant to run elsewhere.

use std::io;

use tracing::{debug, trace};

use crate::error::ShellError;
use crate::status;

/// How a stop-aware group wait concluded.
pub enum WaitOutcome {
    /// Every process the caller asked about has terminated.
    AllExited,
    /// At least one process in the group was stopped (SIGTSTP/SIGSTOP).
    /// Carries the pids, if any, that this same wait loop already reaped
    /// as exited *before* the stop was observed — the kernel has no
    /// record of them any more, so the caller must drop them from
    /// whatever it still tracks rather than wait on them again.
    Stopped(Vec<libc::pid_t>),
}

/// `setpgid(pid, pgid)`. Tolerant of the fork/exec race: if the
/// child has already exec'd or exited by the time we get here, the call
/// fails with `EACCES`/`ESRCH`, which is harmless — whichever side of the
/// race won already produced the correct group layout.
pub fn set_process_group(pid: libc::pid_t, pgid: libc::pid_t) -> Result<(), ShellError> {
    loop {
        let rc = unsafe { libc::setpgid(pid, pgid) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            Some(code) if code == libc::EACCES || code == libc::ESRCH => return Ok(()),
            _ => return Err(ShellError::SetProcessGroup(err)),
        }
    }
}

/// `kill(-pgid, SIGCONT)` — wakes every member of a stopped group.
pub fn send_continue_to_group(pgid: libc::pid_t) -> Result<(), ShellError> {
    loop {
        let rc = unsafe { libc::kill(-pgid, libc::SIGCONT) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(ShellError::Wait(err));
    }
}

/// RAII guard that hands the controlling terminal's foreground-group
/// designation to `target_pgid` on construction and unconditionally
/// returns it to the shell's own group on drop, even if the job stopped
/// instead of finishing ("give → wait → take back").
pub struct ForegroundTerminalGuard {
    tty_fd: Option<libc::c_int>,
    shell_pgid: libc::pid_t,
}

impl ForegroundTerminalGuard {
    pub fn new(target_pgid: libc::pid_t) -> Result<Self, ShellError> {
        let tty_fd = if unsafe { libc::isatty(libc::STDIN_FILENO) } == 1 {
            Some(libc::STDIN_FILENO)
        } else {
            None
        };

        let shell_pgid = unsafe { libc::getpgrp() };
        let guard = Self { tty_fd, shell_pgid };

        if let Some(fd) = guard.tty_fd {
            set_terminal_foreground(fd, target_pgid)?;
        }

        Ok(guard)
    }
}

impl Drop for ForegroundTerminalGuard {
    fn drop(&mut self) {
        if let Some(fd) = self.tty_fd {
            let _ = set_terminal_foreground(fd, self.shell_pgid);
        }
    }
}

struct SignalIgnoreGuard {
    signal: libc::c_int,
    previous: libc::sighandler_t,
}

impl SignalIgnoreGuard {
    fn ignore(signal: libc::c_int) -> io::Result<Self> {
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { signal, previous })
    }
}

impl Drop for SignalIgnoreGuard {
    fn drop(&mut self) {
        unsafe {
            libc::signal(self.signal, self.previous);
        }
    }
}

fn set_terminal_foreground(fd: libc::c_int, pgid: libc::pid_t) -> Result<(), ShellError> {
    // tcsetpgrp() would raise SIGTTOU against a caller that is itself a
    // background process relative to the terminal.
    let _sigttou = SignalIgnoreGuard::ignore(libc::SIGTTOU).map_err(ShellError::TerminalHandoff)?;
    loop {
        let rc = unsafe { libc::tcsetpgrp(fd, pgid) };
        if rc == 0 {
            trace!(pgid, "terminal foreground group updated");
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(ShellError::TerminalHandoff(err));
    }
}

/// Wait, with `WUNTRACED`, for every pid in `pids` to either terminate or
/// stop. Returns as soon as the *first* stop is observed; some members of
/// a pipeline may already have exited by then, which is fine — the caller
/// only needs to know the group as a whole is no longer fully running, but
/// it does need to know which pids this call already reaped so it doesn't
/// track them as still-alive members of a Stopped job.
pub fn wait_for_group(pgid: libc::pid_t, pids: &[libc::pid_t]) -> Result<WaitOutcome, ShellError> {
    use std::collections::HashSet;

    let mut remaining: HashSet<libc::pid_t> = pids.iter().copied().collect();
    let mut reaped: Vec<libc::pid_t> = Vec::new();

    while !remaining.is_empty() {
        let mut raw_status: libc::c_int = 0;
        let waited = unsafe { libc::waitpid(-pgid, &mut raw_status, libc::WUNTRACED) };

        if waited < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(ShellError::Wait(err));
        }

        if unsafe { libc::WIFSTOPPED(raw_status) } {
            debug!(pgid, pid = waited, "group member stopped");
            return Ok(WaitOutcome::Stopped(reaped));
        }

        if !remaining.remove(&waited) {
            continue;
        }

        if let Some(code) = status::exit_code_from_wait_status(raw_status) {
            debug!(pgid, pid = waited, code, "group member exited");
        }
        reaped.push(waited);
    }

    Ok(WaitOutcome::AllExited)
}
