use crate::record::{ManagerEvent, Record, TaskEvent, WorkerEvent};
use std::collections::HashMap;
use thiserror::Error;

/// A well-formed record whose mandatory arguments are missing or do not
/// parse. The record contributes nothing to the state, not even entity
/// creation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("task {taskid} WAITING record has no category argument")]
    MissingCategory { taskid: u64 },
    #[error("task {taskid} RUNNING record has no worker argument")]
    MissingWorker { taskid: u64 },
    #[error("task {taskid} DONE record needs status and exit code, got {got:?}")]
    MalformedCompletion { taskid: u64, got: Option<String> },
}

/// Lifetime of the coordinating manager process. Timestamps are raw
/// microseconds from the log; 0 means the event was never observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerState {
    pub pid: Option<u64>,
    pub start: u64,
    pub end: u64,
}

impl ManagerState {
    fn apply(&mut self, time: u64, pid: u64, state: ManagerEvent) {
        match state {
            ManagerEvent::Start => {
                // A later START reopens the window (manager restarted
                // mid-file), so any earlier END is discarded.
                self.pid = Some(pid);
                self.start = time;
                self.end = 0;
            }
            ManagerEvent::End => {
                self.end = time;
            }
        }
    }
}

/// One task's observed lifecycle. Fields stay zero/empty until the
/// corresponding event arrives; updates are overwrites, never merges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskState {
    pub wait: u64,
    pub start: u64,
    pub end: u64,
    pub worker: String,
    pub category: String,
    pub state: TaskEvent,
    pub state_args: String,
}

/// A task record's arguments, validated before any store mutation so a
/// malformed record contributes nothing, not even entity creation.
enum TaskUpdate {
    Waiting { category: String },
    Running { worker: String },
    Done { label: String },
    Canceled,
    Other,
}

impl TaskUpdate {
    fn parse(taskid: u64, state: &TaskEvent, args: Option<&str>) -> Result<Self, ApplyError> {
        match state {
            TaskEvent::Waiting => {
                let category =
                    first_token(args).ok_or(ApplyError::MissingCategory { taskid })?;
                Ok(TaskUpdate::Waiting { category })
            }
            TaskEvent::Running => {
                let worker = first_token(args).ok_or(ApplyError::MissingWorker { taskid })?;
                Ok(TaskUpdate::Running { worker })
            }
            TaskEvent::Done => {
                let (status, exit_code) =
                    completion_args(args).ok_or_else(|| ApplyError::MalformedCompletion {
                        taskid,
                        got: args.map(str::to_string),
                    })?;
                let label = if exit_code != 0 {
                    "FAILED".to_string()
                } else {
                    status
                };
                Ok(TaskUpdate::Done { label })
            }
            TaskEvent::Canceled => Ok(TaskUpdate::Canceled),
            TaskEvent::Other(_) => Ok(TaskUpdate::Other),
        }
    }
}

impl TaskState {
    fn apply(&mut self, time: u64, state: TaskEvent, update: TaskUpdate) {
        match update {
            TaskUpdate::Waiting { category } => {
                self.wait = time;
                self.category = category;
            }
            TaskUpdate::Running { worker } => {
                self.start = time;
                self.worker = worker;
            }
            TaskUpdate::Done { label } => {
                self.end = time;
                self.state_args = label;
            }
            TaskUpdate::Canceled => {
                // A task canceled while still waiting never ran; it gets
                // no end timestamp and reports zero runtime.
                if self.start > 0 {
                    self.end = time;
                }
            }
            TaskUpdate::Other => {}
        }
        self.state = state;
    }
}

/// One worker's connection window, keyed by host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerState {
    pub workerid: String,
    pub start: u64,
    pub end: u64,
    pub state: Option<WorkerEvent>,
    pub state_args: String,
}

/// Keyed task store preserving first-observed order, which the reporter
/// relies on for row ordering.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    entries: HashMap<u64, TaskState>,
    order: Vec<u64>,
}

impl TaskStore {
    /// Tasks are created lazily with zeroed defaults on the first record
    /// of any kind, so logs that begin mid-stream still reconstruct.
    pub fn get_or_create(&mut self, taskid: u64) -> &mut TaskState {
        if !self.entries.contains_key(&taskid) {
            self.order.push(taskid);
            self.entries.insert(taskid, TaskState::default());
        }
        self.entries.get_mut(&taskid).expect("entry just ensured")
    }

    pub fn get(&self, taskid: u64) -> Option<&TaskState> {
        self.entries.get(&taskid)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates in first-observed order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &TaskState)> {
        self.order.iter().map(|id| (*id, &self.entries[id]))
    }
}

/// Keyed worker store preserving first-observed order. A reconnecting
/// host replaces its entry but keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct WorkerStore {
    entries: HashMap<String, WorkerState>,
    order: Vec<String>,
}

impl WorkerStore {
    pub fn get_or_create(&mut self, host: &str) -> &mut WorkerState {
        if !self.entries.contains_key(host) {
            self.order.push(host.to_string());
            self.entries.insert(host.to_string(), WorkerState::default());
        }
        self.entries.get_mut(host).expect("entry just ensured")
    }

    pub fn get(&self, host: &str) -> Option<&WorkerState> {
        self.entries.get(host)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkerState)> {
        self.order.iter().map(|host| (host.as_str(), &self.entries[host]))
    }
}

/// The three accumulated stores of one reconstruction. Owned exclusively
/// by a single run; a snapshot once end-of-stream is reached.
#[derive(Debug, Clone, Default)]
pub struct LogState {
    pub manager: ManagerState,
    pub tasks: TaskStore,
    pub workers: WorkerStore,
}

impl LogState {
    pub fn apply(&mut self, record: Record) -> Result<(), ApplyError> {
        match record {
            Record::Manager { time, pid, state } => {
                self.manager.apply(time, pid, state);
                Ok(())
            }
            Record::Task {
                time,
                taskid,
                state,
                state_args,
                ..
            } => {
                let update = TaskUpdate::parse(taskid, &state, state_args.as_deref())?;
                self.tasks.get_or_create(taskid).apply(time, state, update);
                Ok(())
            }
            Record::Worker {
                time,
                workerid,
                host,
                state,
                state_args,
                ..
            } => {
                match state {
                    WorkerEvent::Connection => {
                        let entry = self.workers.get_or_create(&host);
                        *entry = WorkerState {
                            workerid,
                            start: time,
                            end: 0,
                            state: Some(WorkerEvent::Connection),
                            state_args: String::new(),
                        };
                    }
                    WorkerEvent::Disconnection => {
                        // A disconnect for a host never seen connecting
                        // (log began mid-stream) synthesizes a placeholder
                        // with start = 0 rather than failing the line.
                        let entry = self.workers.get_or_create(&host);
                        if entry.workerid.is_empty() {
                            entry.workerid = workerid;
                        }
                        entry.end = time;
                        entry.state_args = state_args.unwrap_or_default();
                        entry.state = Some(WorkerEvent::Disconnection);
                    }
                }
                Ok(())
            }
        }
    }
}

fn first_token(args: Option<&str>) -> Option<String> {
    args?.split_whitespace().next().map(str::to_string)
}

/// DONE arguments are `<status> <exit_code>`; anything else is malformed.
fn completion_args(args: Option<&str>) -> Option<(String, i64)> {
    let mut tokens = args?.split_whitespace();
    let status = tokens.next()?.to_string();
    let exit_code = tokens.next()?.parse().ok()?;
    Some((status, exit_code))
}
