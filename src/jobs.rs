//! Component E — the job table.
//!
//! A `Job` tracks every process in a pipeline's group, not just the leader,
//! so the background poll can tell a partially-finished pipeline (one
//! stage exited, another is still running) from a fully completed one.

use std::collections::BTreeMap;
use std::process::Child;

use tracing::debug;

use crate::status;

/// The lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
}

/// One pipeline executing under a shared process group.
pub struct Job {
    pub id: usize,
    pub pgid: libc::pid_t,
    pub command: String,
    pub state: JobState,
    children: Vec<Child>,
}

impl Job {
    /// All pids still believed to be part of this job's group.
    pub fn pids(&self) -> Vec<libc::pid_t> {
        self.children.iter().map(|c| c.id() as libc::pid_t).collect()
    }

    fn textual_state(&self) -> &'static str {
        match self.state {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
        }
    }
}

/// The shell's job table. Lookup is by `job_id`; a `BTreeMap` keyed by the
/// monotonically increasing id gives insertion-order iteration for free.
#[derive(Default)]
pub struct JobTable {
    jobs: BTreeMap<usize, Job>,
    next_id: usize,
}

impl JobTable {
    pub fn new() -> Self {
        Self { jobs: BTreeMap::new(), next_id: 1 }
    }

    /// Register a new job in `Running` state. Returns the assigned id.
    pub fn insert_running(&mut self, pgid: libc::pid_t, command: String, children: Vec<Child>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        debug!(job_id = id, pgid, "registering running job");
        self.jobs.insert(id, Job { id, pgid, command, state: JobState::Running, children });
        id
    }

    /// Register a new job in `Stopped` state (a foreground pipeline that
    /// was just suspended).
    pub fn insert_stopped(&mut self, pgid: libc::pid_t, command: String, children: Vec<Child>) -> usize {
        let id = self.insert_running(pgid, command, children);
        self.jobs.get_mut(&id).unwrap().state = JobState::Stopped;
        id
    }

    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn set_running(&mut self, id: usize) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.state = JobState::Running;
        }
    }

    pub fn set_stopped(&mut self, id: usize) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.state = JobState::Stopped;
        }
    }

    /// Drop any tracked child whose pid is in `reaped` — already waited on
    /// and removed from the kernel's process table by a stop-aware group
    /// wait before the stop was observed, so `reap`'s later `try_wait` must
    /// never see it again.
    pub fn drop_reaped_children(&mut self, id: usize, reaped: &[libc::pid_t]) {
        if reaped.is_empty() {
            return;
        }
        if let Some(job) = self.jobs.get_mut(&id) {
            job.children.retain(|c| !reaped.contains(&(c.id() as libc::pid_t)));
        }
    }

    pub fn remove(&mut self, id: usize) -> Option<Job> {
        self.jobs.remove(&id)
    }

    /// Jobs in insertion (job-id) order, for `jobs`.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Print `[id] <state> <command>` for every live job (§6 `jobs` format).
    pub fn print_table(&self) {
        for job in self.iter() {
            println!("[{}] {} {}", job.id, job.textual_state(), job.command);
        }
    }

    /// Non-blocking poll of every `Running` job's remaining children.
    /// Prints `[id] Done  <command>` and removes the job once every child
    /// has been reaped. Stopped jobs are left untouched.
    pub fn reap(&mut self) {
        let mut done_ids = Vec::new();

        for (id, job) in self.jobs.iter_mut() {
            if job.state != JobState::Running {
                continue;
            }

            let mut still_running = Vec::new();
            for mut child in job.children.drain(..) {
                match child.try_wait() {
                    Ok(Some(exit_status)) => {
                        let code = status::exit_code(exit_status);
                        debug!(job_id = *id, pid = child.id(), code, "child reaped");
                    }
                    Ok(None) => still_running.push(child),
                    Err(e) if e.raw_os_error() == Some(libc::ECHILD) => {
                        debug!(job_id = *id, pid = child.id(), "child already reaped");
                    }
                    Err(e) => {
                        eprintln!("astra: error checking job {id}: {e}");
                    }
                }
            }
            job.children = still_running;

            if job.children.is_empty() {
                println!("[{}] Done  {}", job.id, job.command);
                done_ids.push(*id);
            }
        }

        for id in done_ids {
            self.jobs.remove(&id);
        }
    }
}
