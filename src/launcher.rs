//! Component D — the process launcher.
//!
//! A single external command and a multi-stage pipeline are the same code
//! path here: a pipeline of length 1 is just a degenerate pipeline. Exec
//! itself is performed *inside* the post-fork, pre-exec hook via a manual
//! `execvp`, rather than letting `std::process::Command` perform its own
//! exec — that is what lets an exec failure be reported from the child's
//! own stderr and terminate only that child, instead of surfacing as an
//! `io::Error` back in the parent before any child exists.

use std::ffi::CString;
use std::io;
use std::process::{Child, Command, Stdio};

use os_pipe::{PipeReader, PipeWriter};

use crate::error::ShellError;
use crate::job_control::{self, WaitOutcome};
use crate::jobs::JobTable;
use crate::planner::Pipeline;

/// What happened after handing a pipeline to the kernel.
pub enum LaunchOutcome {
    /// Foreground pipeline ran to completion (or every stage failed to
    /// even start — nothing left to track either way).
    Completed,
    /// Foreground pipeline was stopped (Ctrl-Z) and is now tracked as a job.
    Stopped,
    /// Pipeline was launched with a trailing `&` and is now tracked as a job.
    Backgrounded,
}

/// Fork, group, and exec every stage of `pipeline`, wiring stdout→stdin
/// between adjacent stages with real OS pipes. Returns once the pipeline
/// has either completed, stopped, or been handed off to the job table.
pub fn launch(pipeline: &Pipeline, command_text: &str, job_table: &mut JobTable) -> LaunchOutcome {
    let stage_count = pipeline.stages.len();

    let mut readers: Vec<Option<PipeReader>> = Vec::with_capacity(stage_count.saturating_sub(1));
    let mut writers: Vec<Option<PipeWriter>> = Vec::with_capacity(stage_count.saturating_sub(1));
    for _ in 0..stage_count.saturating_sub(1) {
        match os_pipe::pipe() {
            Ok((reader, writer)) => {
                readers.push(Some(reader));
                writers.push(Some(writer));
            }
            Err(e) => {
                eprintln!("astra: {}", ShellError::Pipe(e));
                return LaunchOutcome::Completed;
            }
        }
    }

    let mut children: Vec<Child> = Vec::with_capacity(stage_count);
    let mut leader_pgid: Option<libc::pid_t> = None;

    for (idx, stage) in pipeline.stages.iter().enumerate() {
        let is_last = idx + 1 == stage_count;

        let mut command = Command::new(&stage.program);
        command.args(&stage.args);

        if idx > 0 {
            command.stdin(Stdio::from(readers[idx - 1].take().expect("stage stdin pipe")));
        }
        if !is_last {
            command.stdout(Stdio::from(writers[idx].take().expect("stage stdout pipe")));
        }

        let target_pgid = leader_pgid;
        let program = stage.program.clone();
        let args = stage.args.clone();

        // SAFETY: the closure only calls async-signal-safe syscalls
        // (signal, setpgid, execvp, write to stderr via a non-buffered
        // stream) between fork and exec.
        unsafe {
            command.pre_exec(move || exec_or_die(target_pgid, &program, &args));
        }

        match command.spawn() {
            Ok(child) => {
                let pid = child.id() as libc::pid_t;
                let pgid = leader_pgid.unwrap_or(pid);
                if let Err(e) = job_control::set_process_group(pid, pgid) {
                    eprintln!("astra: {e}");
                }
                if leader_pgid.is_none() {
                    leader_pgid = Some(pgid);
                }
                children.push(child);
            }
            Err(e) => {
                eprintln!("astra: {}", ShellError::Fork(e));
                wait_out(&mut children);
                return LaunchOutcome::Completed;
            }
        }
    }

    let Some(pgid) = leader_pgid else {
        return LaunchOutcome::Completed;
    };

    if pipeline.background {
        println!("[{}] {}", job_table.insert_running(pgid, command_text.to_string(), children), pgid);
        return LaunchOutcome::Backgrounded;
    }

    run_foreground(pgid, children, command_text, job_table)
}

fn run_foreground(
    pgid: libc::pid_t,
    children: Vec<Child>,
    command_text: &str,
    job_table: &mut JobTable,
) -> LaunchOutcome {
    let pids: Vec<libc::pid_t> = children.iter().map(|c| c.id() as libc::pid_t).collect();

    let guard = match job_control::ForegroundTerminalGuard::new(pgid) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("astra: {e}");
            None
        }
    };

    let outcome = job_control::wait_for_group(pgid, &pids);
    drop(guard);

    match outcome {
        Ok(WaitOutcome::AllExited) => LaunchOutcome::Completed,
        Ok(WaitOutcome::Stopped(reaped)) => {
            let still_alive = drop_reaped(children, &reaped);
            let id = job_table.insert_stopped(pgid, command_text.to_string(), still_alive);
            println!("[{id}] Stopped {command_text}");
            LaunchOutcome::Stopped
        }
        Err(e) => {
            eprintln!("astra: {e}");
            LaunchOutcome::Completed
        }
    }
}

/// Drop any child whose pid the wait loop already reaped before it saw the
/// stop, so a Stopped job's tracked children never include one the kernel
/// no longer knows about.
fn drop_reaped(children: Vec<Child>, reaped: &[libc::pid_t]) -> Vec<Child> {
    children.into_iter().filter(|c| !reaped.contains(&(c.id() as libc::pid_t))).collect()
}

fn wait_out(children: &mut Vec<Child>) {
    for mut child in children.drain(..) {
        let _ = child.wait();
    }
}

/// Runs inside the forked child, between `fork` and `exec`. Resets the
/// signal dispositions the shell ignores, joins (or creates) the
/// pipeline's process group, then execs directly via `libc::execvp` —
/// bypassing `std::process::Command`'s own exec step entirely, so that a
/// failure can be reported from this process's own stderr before an abrupt
/// `_exit`.
fn exec_or_die(target_pgid: Option<libc::pid_t>, program: &str, args: &[String]) -> io::Result<()> {
    // SIG_IGN dispositions (unlike a handler) survive exec, so the shell's
    // ignored signals must be reset here or the exec'd program would
    // inherit them as ignored too.
    for &signal in &[libc::SIGINT, libc::SIGTSTP, libc::SIGTTIN, libc::SIGTTOU, libc::SIGCONT] {
        if unsafe { libc::signal(signal, libc::SIG_DFL) } == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }

    if unsafe { libc::setpgid(0, target_pgid.unwrap_or(0)) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let Ok(program_c) = CString::new(program) else {
        eprintln!("execvp: {program}: invalid program name");
        unsafe { libc::_exit(1) };
    };
    let arg_cstrings: Vec<CString> = std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .filter_map(|s| CString::new(s).ok())
        .collect();
    let mut argv: Vec<*const libc::c_char> = arg_cstrings.iter().map(|c| c.as_ptr()).collect();
    argv.push(std::ptr::null());

    unsafe {
        libc::execvp(program_c.as_ptr(), argv.as_ptr());
    }

    let err = io::Error::last_os_error();
    eprintln!("execvp: {err}");
    unsafe { libc::_exit(1) };
}
