use crate::state::LogState;
use serde::Serialize;
use std::fmt::Write as _;
use thiserror::Error;

/// A manager window shorter than this is evidence of a malformed or
/// truncated log, not a fast run.
pub const MIN_MANAGER_RUNTIME_US: i64 = 1_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SummaryError {
    #[error("manager window incomplete: start={start_us}us end={end_us}us")]
    IncompleteManagerWindow { start_us: u64, end_us: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerRow {
    pub pid: Option<u64>,
    pub runtime_us: i64,
}

/// One task table row. Durations are clamped to zero so out-of-order
/// timestamps never report negative waits or runtimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRow {
    pub taskid: u64,
    pub category: String,
    pub worker: String,
    pub wait_us: i64,
    pub runtime_us: i64,
    pub state: String,
    pub state_args: String,
}

/// One worker table row. Runtime is deliberately NOT clamped: a worker
/// that never disconnected shows a negative value rather than hiding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerRow {
    pub host: String,
    pub runtime_us: i64,
    pub state: String,
    pub state_args: String,
}

/// Derived metrics for one finished reconstruction, rows in the order the
/// entities were first observed in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub manager: ManagerRow,
    pub tasks: Vec<TaskRow>,
    pub workers: Vec<WorkerRow>,
}

impl Summary {
    pub fn from_state(state: &LogState) -> Result<Self, SummaryError> {
        let runtime_us = state.manager.end as i64 - state.manager.start as i64;
        if runtime_us < MIN_MANAGER_RUNTIME_US {
            return Err(SummaryError::IncompleteManagerWindow {
                start_us: state.manager.start,
                end_us: state.manager.end,
            });
        }

        let tasks = state
            .tasks
            .iter()
            .map(|(taskid, t)| TaskRow {
                taskid,
                category: t.category.clone(),
                worker: t.worker.clone(),
                wait_us: (t.start as i64 - t.wait as i64).max(0),
                runtime_us: (t.end as i64 - t.start as i64).max(0),
                state: t.state.to_string(),
                state_args: t.state_args.clone(),
            })
            .collect();

        let workers = state
            .workers
            .iter()
            .map(|(host, w)| WorkerRow {
                host: host.to_string(),
                runtime_us: w.end as i64 - w.start as i64,
                state: w.state.map(|s| s.as_str().to_string()).unwrap_or_default(),
                state_args: w.state_args.clone(),
            })
            .collect();

        Ok(Self {
            manager: ManagerRow {
                pid: state.manager.pid,
                runtime_us,
            },
            tasks,
            workers,
        })
    }

    /// Renders the semicolon-delimited report. When `job_id` is given it
    /// prefixes every row (and a JobId header column) so an external
    /// driver can aggregate across jobs.
    pub fn render(&self, job_id: Option<&str>) -> String {
        let mut out = String::new();
        let prefix = match job_id {
            Some(job) => format!("{job};"),
            None => String::new(),
        };
        let header_prefix = if job_id.is_some() { "JobId;" } else { "" };

        let _ = writeln!(
            out,
            "Manager runtime: {}s",
            format_micros(self.manager.runtime_us)
        );
        out.push('\n');

        let _ = writeln!(
            out,
            "{header_prefix}Task ID;Category;Worker;Waiting;Runtime;Status;Extra"
        );
        for row in &self.tasks {
            let _ = writeln!(
                out,
                "{prefix}{};{};{};{};{};{};'{}'",
                row.taskid,
                row.category,
                row.worker,
                format_micros(row.wait_us),
                format_micros(row.runtime_us),
                row.state,
                row.state_args,
            );
        }
        out.push('\n');

        let _ = writeln!(out, "{header_prefix}Worker;Runtime;Status;Extra");
        for row in &self.workers {
            let _ = writeln!(
                out,
                "{prefix}{};{};{};'{}'",
                row.host,
                format_micros(row.runtime_us),
                row.state,
                row.state_args,
            );
        }

        out
    }
}

/// Formats an exact microsecond duration as decimal seconds with at least
/// one fractional digit and no trailing zeros: 2500000 -> "2.5",
/// 1000000 -> "1.0", 0 -> "0.0".
pub fn format_micros(us: i64) -> String {
    let sign = if us < 0 { "-" } else { "" };
    let abs = us.unsigned_abs();
    let secs = abs / 1_000_000;
    let frac = format!("{:06}", abs % 1_000_000);
    let frac = frac.trim_end_matches('0');
    let frac = if frac.is_empty() { "0" } else { frac };
    format!("{sign}{secs}.{frac}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruct::reconstruct;

    fn summary_of(log: &str) -> Summary {
        let (state, _) = reconstruct(log.as_bytes()).unwrap();
        Summary::from_state(&state).unwrap()
    }

    #[test]
    fn manager_runtime_converts_microseconds_exactly() {
        let summary = summary_of("1000000 1 MANAGER START\n3500000 1 MANAGER END\n");
        assert_eq!(summary.manager.runtime_us, 2_500_000);
        assert!(summary
            .render(None)
            .starts_with("Manager runtime: 2.5s\n"));
    }

    #[test]
    fn short_manager_window_is_an_error() {
        let (state, _) = reconstruct(
            "1000000 1 MANAGER START\n1999999 1 MANAGER END\n".as_bytes(),
        )
        .unwrap();
        assert_eq!(
            Summary::from_state(&state).unwrap_err(),
            SummaryError::IncompleteManagerWindow {
                start_us: 1_000_000,
                end_us: 1_999_999,
            }
        );
    }

    #[test]
    fn missing_manager_records_are_an_error() {
        let (state, _) = reconstruct("1 1 TASK 7 WAITING build\n".as_bytes()).unwrap();
        assert!(Summary::from_state(&state).is_err());
    }

    #[test]
    fn task_row_matches_reference_output() {
        let summary = summary_of(
            "0 1 MANAGER START\n\
             0 1 TASK 7 WAITING build\n\
             500000 1 TASK 7 RUNNING workerA\n\
             1500000 1 TASK 7 DONE ok 0\n\
             2000000 1 MANAGER END\n",
        );
        let rendered = summary.render(None);
        assert!(rendered.contains("Task ID;Category;Worker;Waiting;Runtime;Status;Extra\n"));
        assert!(rendered.contains("7;build;workerA;0.5;1.0;DONE;'ok'\n"));
    }

    #[test]
    fn worker_row_matches_reference_output() {
        let summary = summary_of(
            "0 1 MANAGER START\n\
             0 1 WORKER w1 10.0.0.1 CONNECTION\n\
             2000000 1 WORKER w1 10.0.0.1 DISCONNECTION idle\n\
             3000000 1 MANAGER END\n",
        );
        let rendered = summary.render(None);
        assert!(rendered.contains("Worker;Runtime;Status;Extra\n"));
        assert!(rendered.contains("10.0.0.1;2.0;DISCONNECTION;'idle'\n"));
    }

    #[test]
    fn canceled_while_waiting_reports_zero_runtime() {
        let summary = summary_of(
            "0 1 MANAGER START\n\
             100 1 TASK 9 WAITING build\n\
             200 1 TASK 9 CANCELED\n\
             2000000 1 MANAGER END\n",
        );
        let row = &summary.tasks[0];
        assert_eq!(row.runtime_us, 0);
        assert_eq!(row.state, "CANCELED");
        assert!(summary.render(None).contains("9;build;;0.0;0.0;CANCELED;''\n"));
    }

    #[test]
    fn out_of_order_timestamps_clamp_to_zero() {
        let summary = summary_of(
            "0 1 MANAGER START\n\
             900000 1 TASK 2 WAITING build\n\
             400000 1 TASK 2 RUNNING w\n\
             100000 1 TASK 2 DONE ok 0\n\
             2000000 1 MANAGER END\n",
        );
        let row = &summary.tasks[0];
        assert_eq!(row.wait_us, 0);
        assert_eq!(row.runtime_us, 0);
    }

    #[test]
    fn never_disconnected_worker_reports_negative_runtime() {
        let summary = summary_of(
            "0 1 MANAGER START\n\
             500000 1 WORKER w1 hostA CONNECTION\n\
             2000000 1 MANAGER END\n",
        );
        assert_eq!(summary.workers[0].runtime_us, -500_000);
        assert!(summary.render(None).contains("hostA;-0.5;CONNECTION;''\n"));
    }

    #[test]
    fn job_id_prefixes_headers_and_rows() {
        let summary = summary_of(
            "0 1 MANAGER START\n\
             0 1 TASK 7 WAITING build\n\
             2000000 1 MANAGER END\n",
        );
        let rendered = summary.render(Some("job42"));
        assert!(rendered.contains("JobId;Task ID;Category;Worker;Waiting;Runtime;Status;Extra\n"));
        assert!(rendered.contains("job42;7;build;;0.0;0.0;WAITING;''\n"));
        assert!(rendered.contains("JobId;Worker;Runtime;Status;Extra\n"));
    }

    #[test]
    fn formats_microseconds_as_trimmed_seconds() {
        assert_eq!(format_micros(2_500_000), "2.5");
        assert_eq!(format_micros(1_000_000), "1.0");
        assert_eq!(format_micros(0), "0.0");
        assert_eq!(format_micros(123_456), "0.123456");
        assert_eq!(format_micros(-1_500_000), "-1.5");
    }

    #[test]
    fn rows_serialize_for_json_output() {
        let summary = summary_of(
            "0 1 MANAGER START\n\
             0 1 TASK 7 WAITING build\n\
             2000000 1 MANAGER END\n",
        );
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["manager"]["runtime_us"], 2_000_000);
        assert_eq!(value["tasks"][0]["taskid"], 7);
        assert_eq!(value["tasks"][0]["category"], "build");
    }
}
