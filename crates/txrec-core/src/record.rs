use regex::Regex;
use std::fmt;

/// Manager lifecycle token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerEvent {
    Start,
    End,
}

impl ManagerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagerEvent::Start => "START",
            ManagerEvent::End => "END",
        }
    }
}

impl fmt::Display for ManagerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Worker lifecycle token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEvent {
    Connection,
    Disconnection,
}

impl WorkerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerEvent::Connection => "CONNECTION",
            WorkerEvent::Disconnection => "DISCONNECTION",
        }
    }
}

impl fmt::Display for WorkerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle token. The grammar accepts any token here; tokens the
/// state machine does not model are kept verbatim so the report can echo
/// them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Waiting,
    Running,
    Done,
    Canceled,
    Other(String),
}

impl TaskEvent {
    pub fn from_token(token: &str) -> Self {
        match token {
            "WAITING" => TaskEvent::Waiting,
            "RUNNING" => TaskEvent::Running,
            "DONE" => TaskEvent::Done,
            "CANCELED" => TaskEvent::Canceled,
            other => TaskEvent::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskEvent::Waiting => "WAITING",
            TaskEvent::Running => "RUNNING",
            TaskEvent::Done => "DONE",
            TaskEvent::Canceled => "CANCELED",
            TaskEvent::Other(token) => token,
        }
    }
}

impl Default for TaskEvent {
    fn default() -> Self {
        TaskEvent::Other(String::new())
    }
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three record grammars a line can match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Manager,
    Task,
    Worker,
}

/// One classified transaction-log record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Manager {
        time: u64,
        pid: u64,
        state: ManagerEvent,
    },
    Task {
        time: u64,
        pid: u64,
        taskid: u64,
        state: TaskEvent,
        state_args: Option<String>,
    },
    Worker {
        time: u64,
        pid: u64,
        workerid: String,
        host: String,
        state: WorkerEvent,
        state_args: Option<String>,
    },
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Manager { .. } => RecordKind::Manager,
            Record::Task { .. } => RecordKind::Task,
            Record::Worker { .. } => RecordKind::Worker,
        }
    }
}

/// Outcome of matching one raw line.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// A grammar matched and every field parsed.
    Matched(Record),
    /// A grammar matched but a numeric field did not fit.
    Malformed,
    /// No grammar matched; the line belongs to a record kind this tool
    /// does not model and is skipped.
    Unmatched,
}

/// Matches raw lines against the three record grammars in fixed priority
/// order: MANAGER, then TASK, then WORKER. Grammars are not disjoint by
/// construction, so the order is part of the contract.
pub struct LineClassifier {
    manager: Regex,
    task: Regex,
    worker: Regex,
}

impl LineClassifier {
    pub fn new() -> Self {
        Self {
            manager: Regex::new(
                r"^(?P<time>\d+)\s+(?P<pid>\d+)\s+MANAGER\s+(?P<state>START|END)(?:\s|$)",
            )
            .expect("valid regex"),
            task: Regex::new(
                r"^(?P<time>\d+)\s+(?P<pid>\d+)\s+TASK\s+(?P<taskid>\d+)\s+(?P<state>\S+)\s*(?P<state_args>.+)?",
            )
            .expect("valid regex"),
            worker: Regex::new(
                r"^(?P<time>\d+)\s+(?P<pid>\d+)\s+WORKER\s+(?P<workerid>\S+)\s+(?P<host>\S+)\s+(?P<state>CONNECTION|DISCONNECTION)\s*(?P<state_args>.+)?",
            )
            .expect("valid regex"),
        }
    }

    pub fn classify(&self, line: &str) -> Classification {
        if let Some(caps) = self.manager.captures(line) {
            let (Some(time), Some(pid)) = (parse_uint(&caps, "time"), parse_uint(&caps, "pid"))
            else {
                return Classification::Malformed;
            };
            let state = match &caps["state"] {
                "START" => ManagerEvent::Start,
                _ => ManagerEvent::End,
            };
            return Classification::Matched(Record::Manager { time, pid, state });
        }

        if let Some(caps) = self.task.captures(line) {
            let (Some(time), Some(pid), Some(taskid)) = (
                parse_uint(&caps, "time"),
                parse_uint(&caps, "pid"),
                parse_uint(&caps, "taskid"),
            ) else {
                return Classification::Malformed;
            };
            return Classification::Matched(Record::Task {
                time,
                pid,
                taskid,
                state: TaskEvent::from_token(&caps["state"]),
                state_args: rest_of_line(&caps),
            });
        }

        if let Some(caps) = self.worker.captures(line) {
            let (Some(time), Some(pid)) = (parse_uint(&caps, "time"), parse_uint(&caps, "pid"))
            else {
                return Classification::Malformed;
            };
            let state = match &caps["state"] {
                "CONNECTION" => WorkerEvent::Connection,
                _ => WorkerEvent::Disconnection,
            };
            return Classification::Matched(Record::Worker {
                time,
                pid,
                workerid: caps["workerid"].to_string(),
                host: caps["host"].to_string(),
                state,
                state_args: rest_of_line(&caps),
            });
        }

        Classification::Unmatched
    }
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_uint(caps: &regex::Captures<'_>, name: &str) -> Option<u64> {
    caps.name(name)?.as_str().parse().ok()
}

fn rest_of_line(caps: &regex::Captures<'_>) -> Option<String> {
    caps.name("state_args").and_then(|m| {
        let trimmed = m.as_str().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
