//! Component B — turns a token sequence into something the dispatcher or
//! the launcher can act on.

use crate::builtins;
use crate::error::ParseError;

/// One program invocation: the first token is the program name, the rest
/// are its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
}

/// One or more `Command`s chained by `|`, plus whether the whole thing
/// should run in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Command>,
    pub background: bool,
}

/// What the planner decided a line is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Single stage, first token names a builtin.
    Builtin(Command, bool),
    /// Everything else: a single external command or a multi-stage
    /// pipeline (a builtin appearing mid-pipeline is planned as External,
    /// per the builtin-with-pipe policy — it will be forked like any
    /// other program and will typically fail to exec).
    External(Pipeline),
}

/// Plan a tokenised line. Returns `Ok(None)` for empty input (the caller
/// should simply re-prompt).
pub fn plan(tokens: Vec<String>) -> Result<Option<Plan>, ParseError> {
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut tokens = tokens;
    let background = matches!(tokens.last(), Some(t) if t == "&");
    if background {
        tokens.pop();
    }

    if tokens.is_empty() {
        // A bare "&" with nothing before it.
        return Err(ParseError::EmptyStage);
    }

    let stages = split_stages(&tokens)?;

    if stages.len() == 1 && builtins::is_builtin(&stages[0].program) {
        let command = stages.into_iter().next().unwrap();
        return Ok(Some(Plan::Builtin(command, background)));
    }

    Ok(Some(Plan::External(Pipeline { stages, background })))
}

fn split_stages(tokens: &[String]) -> Result<Vec<Command>, ParseError> {
    let mut stages = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for token in tokens {
        if token == "|" {
            if current.is_empty() {
                return Err(ParseError::EmptyStage);
            }
            stages.push(to_command(std::mem::take(&mut current)));
        } else {
            current.push(token.clone());
        }
    }

    if current.is_empty() {
        return Err(ParseError::EmptyStage);
    }
    stages.push(to_command(current));

    Ok(stages)
}

fn to_command(words: Vec<String>) -> Command {
    let mut iter = words.into_iter();
    let program = iter.next().expect("non-empty stage");
    Command { program, args: iter.collect() }
}

/// Parse an `fg`/`bg` argument of the form `%<integer>` into a job id.
pub fn parse_job_id(command: &'static str, token: &str) -> Result<usize, ParseError> {
    let digits = token.strip_prefix('%').ok_or_else(|| ParseError::MalformedJobId {
        command,
        token: token.to_string(),
    })?;

    digits.parse::<usize>().map_err(|_| ParseError::MalformedJobId {
        command,
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn plan_line(line: &str) -> Result<Option<Plan>, ParseError> {
        plan(tokenize(line))
    }

    #[test]
    fn empty_input_yields_no_plan() {
        assert_eq!(plan_line("").unwrap(), None);
    }

    #[test]
    fn single_external_command() {
        let plan = plan_line("ls -la").unwrap().unwrap();
        assert_eq!(
            plan,
            Plan::External(Pipeline {
                stages: vec![Command { program: "ls".into(), args: vec!["-la".into()] }],
                background: false,
            })
        );
    }

    #[test]
    fn trailing_amp_sets_background_and_is_stripped() {
        let plan = plan_line("sleep 5 &").unwrap().unwrap();
        match plan {
            Plan::External(p) => {
                assert!(p.background);
                assert_eq!(p.stages.len(), 1);
                assert_eq!(p.stages[0].program, "sleep");
            }
            other => panic!("expected External, got {other:?}"),
        }
    }

    #[test]
    fn bare_amp_is_a_parse_error() {
        assert_eq!(plan_line("&").unwrap_err(), ParseError::EmptyStage);
    }

    #[test]
    fn pipeline_splits_on_pipe() {
        let plan = plan_line("ls | grep foo | wc -l").unwrap().unwrap();
        match plan {
            Plan::External(p) => {
                assert_eq!(p.stages.len(), 3);
                assert_eq!(p.stages[1].program, "grep");
                assert_eq!(p.stages[2].args, vec!["-l"]);
            }
            other => panic!("expected External, got {other:?}"),
        }
    }

    #[test]
    fn leading_trailing_and_doubled_pipe_are_parse_errors() {
        assert_eq!(plan_line("| ls").unwrap_err(), ParseError::EmptyStage);
        assert_eq!(plan_line("ls |").unwrap_err(), ParseError::EmptyStage);
        assert_eq!(plan_line("ls || wc").unwrap_err(), ParseError::EmptyStage);
        assert_eq!(plan_line("|").unwrap_err(), ParseError::EmptyStage);
    }

    #[test]
    fn single_stage_builtin_is_classified_as_builtin() {
        let plan = plan_line("cd /tmp").unwrap().unwrap();
        assert_eq!(
            plan,
            Plan::Builtin(Command { program: "cd".into(), args: vec!["/tmp".into()] }, false)
        );
    }

    #[test]
    fn builtin_inside_pipeline_is_classified_as_external() {
        let plan = plan_line("cd /tmp | wc -l").unwrap().unwrap();
        match plan {
            Plan::External(p) => assert_eq!(p.stages[0].program, "cd"),
            other => panic!("expected External, got {other:?}"),
        }
    }

    #[test]
    fn parse_job_id_accepts_percent_integer() {
        assert_eq!(parse_job_id("fg", "%3").unwrap(), 3);
    }

    #[test]
    fn parse_job_id_rejects_malformed_tokens() {
        assert!(parse_job_id("fg", "3").is_err());
        assert!(parse_job_id("fg", "%abc").is_err());
        assert!(parse_job_id("fg", "%").is_err());
    }
}
