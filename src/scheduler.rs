//! The worker pool (C6): a fixed-size pool of OS threads pulling typed
//! work items off a single mutex+condvar-guarded queue, fail-fast on the
//! first error. Grounded on spec.md §9's own redesign note ("thread pool
//! built on a generic FIFO of closures... re-express as a pool of workers
//! plus a typed work item") and, for the concrete child-process shape, on
//! `megaton-hammer`'s `ChildBuilder`/`BuildTask` (spawn, capture stderr,
//! `wait()` for an exit status). Not `rayon`: rayon's work-stealing FIFO
//! has no notion of "this item becomes ready only after that one
//! finishes", which is exactly the ordering constraint this scheduler
//! exists to enforce.

use crate::error::{BuildError, Result};
use crate::targets::{TargetGraph, TargetId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use tracing::{debug, error, info, instrument, trace, warn};

/// One command the pool must run: a target's compile, archive, or link
/// step as a fully qualified argv (spec.md §6, "no shell interpolation").
#[derive(Clone, Debug)]
pub struct WorkItem {
    pub target: TargetId,
    pub output_path: PathBuf,
    pub tool: PathBuf,
    pub args: Vec<String>,
}

enum QueueEntry {
    Work(WorkItem),
    Poison,
}

struct SharedState {
    queue: Mutex<VecDeque<QueueEntry>>,
    not_empty: Condvar,
    pending: Mutex<HashMap<TargetId, usize>>,
    successors: HashMap<TargetId, Vec<TargetId>>,
    work: Mutex<HashMap<TargetId, WorkItem>>,
    remaining: AtomicUsize,
    shutting_down: AtomicBool,
    first_error: Mutex<Option<BuildError>>,
    completed: Mutex<Vec<TargetId>>,
}

impl SharedState {
    fn enqueue(&self, entry: QueueEntry) {
        let mut queue = self.queue.lock().unwrap();
        queue.push_back(entry);
        self.not_empty.notify_one();
    }

    /// Called after a target's command succeeds: decrements every
    /// successor's pending-predecessor count, enqueuing any that reach
    /// zero (spec.md §4.6, "Success: ... decrement successors' predecessor
    /// counts, enqueue those that reach zero").
    fn on_success(&self, target: TargetId) {
        self.completed.lock().unwrap().push(target);
        let remaining = self.remaining.fetch_sub(1, Ordering::SeqCst) - 1;
        trace!(?target, remaining, "target built");

        let Some(successors) = self.successors.get(&target) else { return };
        let mut pending = self.pending.lock().unwrap();
        let work = self.work.lock().unwrap();
        for &succ in successors {
            if let Some(count) = pending.get_mut(&succ) {
                *count -= 1;
                if *count == 0 {
                    if let Some(item) = work.get(&succ) {
                        self.enqueue(QueueEntry::Work(item.clone()));
                    }
                }
            }
        }
        if remaining == 0 {
            self.not_empty.notify_all();
        }
    }

    /// Fail-fast shutdown: records the first error, then injects enough
    /// poison to guarantee every worker exits at its next dequeue rather
    /// than starting new work (spec.md §4.6).
    fn on_failure(&self, err: BuildError, worker_count: usize) {
        let mut first = self.first_error.lock().unwrap();
        if first.is_none() {
            error!(%err, "build step failed, shutting down");
            *first = Some(err);
        }
        drop(first);
        self.shutting_down.store(true, Ordering::SeqCst);
        let mut queue = self.queue.lock().unwrap();
        queue.clear();
        for _ in 0..worker_count {
            queue.push_back(QueueEntry::Poison);
        }
        self.not_empty.notify_all();
    }
}

/// A fixed-size pool of worker threads executing [`WorkItem`]s in
/// dependency order.
pub struct Scheduler {
    worker_count: usize,
}

impl Scheduler {
    pub fn new(worker_count: usize) -> Self {
        Self { worker_count: worker_count.max(1) }
    }

    /// Runs every stale target that has a [`WorkItem`] to completion.
    /// Returns the ids whose command ran and succeeded, in the order they
    /// completed, or the first failure encountered.
    #[instrument(skip_all, fields(workers = self.worker_count, targets = work.len()))]
    pub fn run(&self, graph: &TargetGraph, stale: &HashSet<TargetId>, work: HashMap<TargetId, WorkItem>) -> Result<Vec<TargetId>> {
        let mut successors: HashMap<TargetId, Vec<TargetId>> = HashMap::new();
        let mut pending: HashMap<TargetId, usize> = HashMap::new();
        let mut ready = VecDeque::new();

        for target in graph.iter() {
            if !stale.contains(&target.id) || !work.contains_key(&target.id) {
                continue;
            }
            let mut count = 0usize;
            for &dep in &target.dependencies {
                if stale.contains(&dep) && work.contains_key(&dep) {
                    successors.entry(dep).or_default().push(target.id);
                    count += 1;
                }
            }
            if count == 0 {
                ready.push_back(QueueEntry::Work(work[&target.id].clone()));
            }
            pending.insert(target.id, count);
        }

        let total = work.len();
        info!(total, ready = ready.len(), "scheduler starting");

        let state = SharedState {
            queue: Mutex::new(ready),
            not_empty: Condvar::new(),
            pending: Mutex::new(pending),
            successors,
            work: Mutex::new(work),
            remaining: AtomicUsize::new(total),
            shutting_down: AtomicBool::new(false),
            first_error: Mutex::new(None),
            completed: Mutex::new(Vec::new()),
        };

        if total == 0 {
            return Ok(Vec::new());
        }

        std::thread::scope(|scope| {
            for worker_id in 0..self.worker_count {
                let state = &state;
                scope.spawn(move || worker_loop(worker_id, state, self.worker_count));
            }
        });

        let completed = state.completed.into_inner().unwrap();
        match state.first_error.into_inner().unwrap() {
            Some(err) => Err(err),
            None => Ok(completed),
        }
    }
}

fn worker_loop(worker_id: usize, state: &SharedState, worker_count: usize) {
    loop {
        let entry = {
            let mut queue = state.queue.lock().unwrap();
            loop {
                if let Some(entry) = queue.pop_front() {
                    break entry;
                }
                if state.remaining.load(Ordering::SeqCst) == 0 || state.shutting_down.load(Ordering::SeqCst) {
                    return;
                }
                queue = state.not_empty.wait(queue).unwrap();
            }
        };

        match entry {
            QueueEntry::Poison => {
                debug!(worker_id, "worker exiting on poison");
                return;
            }
            QueueEntry::Work(item) => {
                if state.shutting_down.load(Ordering::SeqCst) {
                    return;
                }
                match execute(&item) {
                    Ok(()) => state.on_success(item.target),
                    Err(err) => {
                        state.on_failure(err, worker_count);
                        return;
                    }
                }
            }
        }
    }
}

/// Spawns `item`'s tool as a child process, captures stdout+stderr, and
/// checks its exit status. No shell is ever invoked (spec.md §6).
fn execute(item: &WorkItem) -> Result<()> {
    let mut cmd = Command::new(&item.tool);
    cmd.args(&item.args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    trace!(?cmd, target = ?item.target, "invoking build command");

    let output = cmd.output().map_err(BuildError::Io)?;
    if !output.status.success() {
        return Err(BuildError::Build {
            target: item.output_path.clone(),
            tool: item.tool.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}
