//! Job-control signal behaviour: stop/continue around Ctrl-Z, and the
//! shell's own immunity to keyboard signals while idle at the prompt.

#![cfg(unix)]

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::time::Duration;

fn spawn_shell() -> (std::process::Child, std::process::ChildStdin, BufReader<std::process::ChildStdout>) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_astra"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn astra");

    let stdin = child.stdin.take().expect("stdin");
    let stdout = BufReader::new(child.stdout.take().expect("stdout"));
    (child, stdin, stdout)
}

fn read_line(stdout: &mut BufReader<std::process::ChildStdout>) -> String {
    let mut buf = String::new();
    stdout.read_line(&mut buf).expect("read line");
    buf
}

/// The pid of the first direct child of `parent_pid`, as reported by `pgrep`.
/// Since the launcher assigns a fresh process group to the leader of every
/// pipeline, this pid also identifies that job's pgid.
fn first_child_pgid(parent_pid: u32) -> i32 {
    for _ in 0..20 {
        let out = Command::new("pgrep")
            .arg("-P")
            .arg(parent_pid.to_string())
            .output()
            .expect("run pgrep");
        if let Some(line) = String::from_utf8_lossy(&out.stdout).lines().next() {
            if let Ok(pid) = line.trim().parse::<i32>() {
                return pid;
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("child of {parent_pid} never appeared");
}

#[test]
fn s5_ctrl_z_stops_job_then_bg_makes_it_running_again() {
    let (mut child, mut stdin, mut stdout) = spawn_shell();
    let shell_pid = child.id();

    writeln!(stdin, "sleep 30").expect("write sleep");
    let pgid = first_child_pgid(shell_pid);

    unsafe {
        libc::kill(-pgid, libc::SIGTSTP);
    }

    let stopped_line = read_line(&mut stdout);
    assert_eq!(stopped_line, "[1] Stopped sleep 30\n");

    writeln!(stdin, "bg %1").expect("write bg");
    let bg_line = read_line(&mut stdout);
    assert_eq!(bg_line, "[1] sleep 30 &\n");

    writeln!(stdin, "jobs").expect("write jobs");
    let jobs_line = read_line(&mut stdout);
    assert_eq!(jobs_line, "[1] Running sleep 30\n");

    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
    std::thread::sleep(Duration::from_millis(200));

    writeln!(stdin, "exit").expect("write exit");
    let _ = child.wait();
}

/// The pid of a direct child of `parent_pid` whose command line contains
/// `needle`, as reported by `pgrep -f`.
fn find_child_pid_matching(parent_pid: u32, needle: &str) -> i32 {
    for _ in 0..40 {
        let out = Command::new("pgrep")
            .arg("-P")
            .arg(parent_pid.to_string())
            .arg("-f")
            .arg(needle)
            .output()
            .expect("run pgrep");
        if let Some(line) = String::from_utf8_lossy(&out.stdout).lines().next() {
            if let Ok(pid) = line.trim().parse::<i32>() {
                return pid;
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("no child of {parent_pid} matching {needle:?} ever appeared");
}

/// The process-group id of a still-live `pid`, via `ps`.
fn pgid_of(pid: i32) -> i32 {
    let out = Command::new("ps").arg("-o").arg("pgid=").arg("-p").arg(pid.to_string()).output().expect("run ps");
    String::from_utf8_lossy(&out.stdout).trim().parse().expect("pgid is numeric")
}

/// Regression for a stop-aware group wait that observes one pipeline stage
/// exit (and reaps it) before it observes a later stage's stop in the same
/// `waitpid` loop: the already-reaped stage must not resurface later as an
/// "error checking job" diagnostic when the background poll tries it again.
#[test]
fn pipeline_stop_races_with_an_already_exited_stage_without_a_spurious_error() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_astra"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn astra");
    let shell_pid = child.id();
    let mut stdin = child.stdin.take().expect("stdin");
    let mut stdout = BufReader::new(child.stdout.take().expect("stdout"));

    writeln!(stdin, "true | sleep 30").expect("write pipeline");
    // Give `true` time to exit so the group wait reaps it before the stop.
    std::thread::sleep(Duration::from_millis(300));

    let sleep_pid = find_child_pid_matching(shell_pid, "sleep 30");
    let pgid = pgid_of(sleep_pid);

    unsafe {
        libc::kill(-pgid, libc::SIGTSTP);
    }

    let stopped_line = read_line(&mut stdout);
    assert_eq!(stopped_line, "[1] Stopped true | sleep 30\n");

    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
    std::thread::sleep(Duration::from_millis(200));

    writeln!(stdin, "exit").expect("write exit");
    drop(stdin);

    let mut stderr = String::new();
    child.stderr.take().expect("stderr").read_to_string(&mut stderr).expect("read stderr");
    let _ = child.wait();

    assert!(!stderr.contains("error checking job"), "stderr was: {stderr}");
}

#[test]
fn shell_survives_sigint_while_idle_at_the_prompt() {
    let (mut child, mut stdin, _stdout) = spawn_shell();
    let shell_pid = child.id() as libc::pid_t;

    unsafe {
        libc::kill(shell_pid, libc::SIGINT);
    }
    std::thread::sleep(Duration::from_millis(100));

    writeln!(stdin, "pwd").expect("write pwd after signal");
    writeln!(stdin, "exit").expect("write exit");

    let output = child.wait_with_output().expect("wait output");
    assert!(output.status.success(), "shell should still exit cleanly after an ignored SIGINT");
}
