//! Translates raw wait statuses into the shell's notion of exit code.
//!
//! On Unix a process terminated by a signal maps to `128 + signal`, the
//! same convention POSIX shells use.

/// Convert a `std::process::ExitStatus` (used by the non-blocking poll path,
/// which goes through `std::process::Child::try_wait`) into an exit code.
pub fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Interpretation of a raw `waitpid` status, used by the group-wait path
/// in `job_control` which calls `libc::waitpid` directly so it can observe
/// `WUNTRACED` stops.
#[cfg(unix)]
pub fn exit_code_from_wait_status(raw_status: libc::c_int) -> Option<i32> {
    if unsafe { libc::WIFEXITED(raw_status) } {
        return Some(unsafe { libc::WEXITSTATUS(raw_status) });
    }

    if unsafe { libc::WIFSIGNALED(raw_status) } {
        let signal = unsafe { libc::WTERMSIG(raw_status) };
        return Some(128 + signal);
    }

    None
}
