//! Component C — the builtin dispatcher.
//!
//! Each builtin runs synchronously on the shell's own thread and never
//! forks: `exit`, `cd`, `pwd`, `jobs`, `fg %id`, `bg %id`.

use crate::job_control::{self, WaitOutcome};
use crate::jobs::JobTable;
use crate::planner::{self, Command};

const BUILTINS: &[&str] = &["cd", "pwd", "exit", "jobs", "fg", "bg"];

/// Whether `name` is one of this shell's six builtins.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// What the REPL loop should do after a builtin ran.
pub enum BuiltinOutcome {
    Continue,
    Exit,
}

/// Dispatch a single-stage builtin invocation.
pub fn dispatch(command: &Command, job_table: &mut JobTable) -> BuiltinOutcome {
    match command.program.as_str() {
        "exit" => BuiltinOutcome::Exit,
        "cd" => {
            builtin_cd(&command.args);
            BuiltinOutcome::Continue
        }
        "pwd" => {
            builtin_pwd();
            BuiltinOutcome::Continue
        }
        "jobs" => {
            job_table.print_table();
            BuiltinOutcome::Continue
        }
        "fg" => {
            builtin_fg(&command.args, job_table);
            BuiltinOutcome::Continue
        }
        "bg" => {
            builtin_bg(&command.args, job_table);
            BuiltinOutcome::Continue
        }
        other => unreachable!("{other} is not a builtin"),
    }
}

fn builtin_cd(args: &[String]) {
    let target = match args.first() {
        Some(dir) => dir.clone(),
        None => std::env::var("HOME").unwrap_or_else(|_| ".".to_string()),
    };

    if let Err(e) = std::env::set_current_dir(&target) {
        eprintln!("cd: {e}");
    }
}

fn builtin_pwd() {
    match std::env::current_dir() {
        Ok(path) => println!("{}", path.display()),
        Err(e) => eprintln!("pwd: {e}"),
    }
}

fn builtin_fg(args: &[String], job_table: &mut JobTable) {
    let token = args.first().map(String::as_str).unwrap_or_default();
    let id = match planner::parse_job_id("fg", token) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let Some(job) = job_table.get(id) else {
        return;
    };
    let pgid = job.pgid;
    let command = job.command.clone();
    let pids = job.pids();

    let guard = job_control::ForegroundTerminalGuard::new(pgid)
        .inspect_err(|e| eprintln!("astra: fg: {e}"))
        .ok();

    if let Err(e) = job_control::send_continue_to_group(pgid) {
        eprintln!("astra: fg: {e}");
        drop(guard);
        return;
    }

    let outcome = job_control::wait_for_group(pgid, &pids);
    drop(guard);

    match outcome {
        Ok(WaitOutcome::AllExited) => {
            job_table.remove(id);
        }
        Ok(WaitOutcome::Stopped(reaped)) => {
            job_table.drop_reaped_children(id, &reaped);
            job_table.set_stopped(id);
            println!("[{id}] Stopped {command}");
        }
        Err(e) => {
            eprintln!("astra: fg: {e}");
            job_table.remove(id);
        }
    }
}

fn builtin_bg(args: &[String], job_table: &mut JobTable) {
    let token = args.first().map(String::as_str).unwrap_or_default();
    let id = match planner::parse_job_id("bg", token) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let Some(job) = job_table.get(id) else {
        return;
    };
    let pgid = job.pgid;
    let command = job.command.clone();

    if let Err(e) = job_control::send_continue_to_group(pgid) {
        eprintln!("astra: bg: {e}");
        return;
    }

    job_table.set_running(id);
    println!("[{id}] {command} &");
}
