use crate::record::{Classification, LineClassifier, RecordKind};
use crate::state::LogState;
use serde::Serialize;
use std::io::BufRead;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconstructError {
    #[error("failed to read transaction log: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters for one reconstruction run. Unmatched lines and malformed
/// records are skipped by contract, not failed; the counts make that
/// visible to the caller.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconstructStats {
    pub lines: u64,
    pub manager_records: u64,
    pub task_records: u64,
    pub worker_records: u64,
    pub unmatched: u64,
    pub malformed: u64,
}

impl ReconstructStats {
    pub fn records(&self) -> u64 {
        self.manager_records + self.task_records + self.worker_records
    }
}

/// Drives the classifier over a log stream line-by-line and routes each
/// record to its reducer. One instance owns one run's state; there is no
/// buffering or lookahead beyond the current line.
#[derive(Default)]
pub struct Reconstruction {
    classifier: LineClassifier,
    state: LogState,
    stats: ReconstructStats,
}

impl Reconstruction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_line(&mut self, line: &str) {
        self.stats.lines += 1;
        match self.classifier.classify(line) {
            Classification::Matched(record) => {
                let kind = record.kind();
                match self.state.apply(record) {
                    Ok(()) => match kind {
                        RecordKind::Manager => self.stats.manager_records += 1,
                        RecordKind::Task => self.stats.task_records += 1,
                        RecordKind::Worker => self.stats.worker_records += 1,
                    },
                    Err(_) => self.stats.malformed += 1,
                }
            }
            Classification::Malformed => self.stats.malformed += 1,
            Classification::Unmatched => self.stats.unmatched += 1,
        }
    }

    pub fn read_from<R: BufRead>(&mut self, reader: R) -> Result<(), ReconstructError> {
        for line in reader.lines() {
            self.apply_line(&line?);
        }
        Ok(())
    }

    pub fn state(&self) -> &LogState {
        &self.state
    }

    pub fn stats(&self) -> &ReconstructStats {
        &self.stats
    }

    pub fn finish(self) -> (LogState, ReconstructStats) {
        (self.state, self.stats)
    }
}

/// Reconstructs one complete log stream from start to end-of-stream.
pub fn reconstruct<R: BufRead>(reader: R) -> Result<(LogState, ReconstructStats), ReconstructError> {
    let mut run = Reconstruction::new();
    run.read_from(reader)?;
    Ok(run.finish())
}
