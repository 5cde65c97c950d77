mod builtins;
mod error;
mod job_control;
mod jobs;
mod launcher;
mod planner;
mod status;
mod tokenizer;

use std::io::{self, Write};

use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use builtins::BuiltinOutcome;
use jobs::JobTable;
use planner::Plan;

const PROMPT: &str = "astra$ ";

/// Why the REPL loop stopped, and the process exit status that corresponds
/// to it (spec §6: zero on `exit`, nonzero only when the shell itself can
/// no longer read further input).
enum LoopExit {
    /// End-of-file (or an unreadable/unwritable terminal) on the shell's
    /// own standard streams.
    Eof,
    /// The `exit` builtin ran.
    BuiltinExit,
}

impl LoopExit {
    fn status_code(&self) -> i32 {
        match self {
            LoopExit::Eof => 1,
            LoopExit::BuiltinExit => 0,
        }
    }
}

fn main() {
    tracing_subscriber::registry().with(fmt::layer()).with(EnvFilter::from_default_env()).init();

    install_shell_signal_dispositions();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut job_table = JobTable::new();

    let reason = loop {
        print!("{PROMPT}");
        if stdout.flush().is_err() {
            break LoopExit::Eof;
        }

        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break LoopExit::Eof,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("astra: {e}");
                std::process::exit(1);
            }
        }

        let tokens = tokenizer::tokenize(&line);
        match planner::plan(tokens) {
            Ok(None) => {}
            Ok(Some(Plan::Builtin(command, _background))) => {
                // Builtins always run synchronously in the foreground; the
                // planner never sets `background` for a single-stage builtin
                // invocation used as a builtin.
                match builtins::dispatch(&command, &mut job_table) {
                    BuiltinOutcome::Continue => {}
                    BuiltinOutcome::Exit => break LoopExit::BuiltinExit,
                }
            }
            Ok(Some(Plan::External(pipeline))) => {
                debug!(command = line.trim(), background = pipeline.background, "launching");
                launcher::launch(&pipeline, line.trim(), &mut job_table);
            }
            Err(e) => eprintln!("{e}"),
        }

        job_table.reap();
    };

    std::process::exit(reason.status_code());
}

/// Claim a process group for the shell and ignore the job-control signals
/// that would otherwise stop or kill it when delivered to the controlling
/// terminal's foreground group. A `SIGCHLD` handler is installed
/// but deliberately left inert — reaping happens only through the explicit
/// `waitpid`/`try_wait` calls in `job_control` and `jobs::JobTable::reap`,
/// never from within the handler itself.
fn install_shell_signal_dispositions() {
    unsafe extern "C" fn inert_sigchld_handler(_signum: libc::c_int) {}

    unsafe {
        let pid = libc::getpid();
        libc::setpgid(pid, pid);

        for &signal in &[libc::SIGINT, libc::SIGTSTP, libc::SIGTTIN, libc::SIGTTOU] {
            libc::signal(signal, libc::SIG_IGN);
        }

        libc::signal(libc::SIGCHLD, inert_sigchld_handler as libc::sighandler_t);
    }
}
