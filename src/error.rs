//! Typed error surfaces for the planner and the process-management core.
//!
//! `thiserror` enums at the boundary a caller might want to match on
//! (`ParseError`) or report and discard (`ShellError`); call sites that
//! only ever print a failure and move on, such as the REPL loop and the
//! background poll, do so directly rather than threading a `Result` up
//! through the dispatcher.

use thiserror::Error;

/// Errors raised by the command planner (component B) before any process
/// is launched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A leading, trailing, or doubled `|` produced a stage with no tokens.
    #[error("astra: syntax error: unexpected token near '|'")]
    EmptyStage,

    /// `fg`/`bg` was given an argument that isn't `%<integer>`.
    #[error("astra: {command}: {token}: bad job id")]
    MalformedJobId { command: &'static str, token: String },
}

/// Errors raised by the process launcher and job controller. An exec
/// failure inside a forked child is reported straight to that child's own
/// stderr before `_exit` and never constructs one of these —
/// these variants cover only the parent-side primitives.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("fork failed: {0}")]
    Fork(#[source] std::io::Error),

    #[error("pipe creation failed: {0}")]
    Pipe(#[source] std::io::Error),

    #[error("setpgid failed: {0}")]
    SetProcessGroup(#[source] std::io::Error),

    #[error("tcsetpgrp failed: {0}")]
    TerminalHandoff(#[source] std::io::Error),

    #[error("waitpid failed: {0}")]
    Wait(#[source] std::io::Error),
}
