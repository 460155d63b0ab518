pub mod record;
pub mod reconstruct;
pub mod report;
pub mod state;

pub use record::{
    Classification, LineClassifier, ManagerEvent, Record, RecordKind, TaskEvent, WorkerEvent,
};
pub use reconstruct::{reconstruct, ReconstructError, ReconstructStats, Reconstruction};
pub use report::{format_micros, ManagerRow, Summary, SummaryError, TaskRow, WorkerRow};
pub use state::{ApplyError, LogState, ManagerState, TaskState, WorkerState};
