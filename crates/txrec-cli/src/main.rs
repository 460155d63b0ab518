use anyhow::{Context, Result};
use clap::Parser;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use txrec_core::{reconstruct, Summary};

#[derive(Parser)]
#[command(name = "txrec")]
#[command(about = "Reconstruct a job timeline from a task manager transaction log", long_about = None)]
struct Cli {
    /// Transaction log to reconstruct (a .gz suffix is decompressed
    /// transparently)
    log_file: PathBuf,

    /// Job identifier prefixed onto every report row; defaults to the log
    /// file's parent directory name
    #[arg(long)]
    job_id: Option<String>,

    /// Emit one JSON document instead of the semicolon tables
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let job_id = cli.job_id.clone().or_else(|| derive_job_id(&cli.log_file));

    let reader = open_log(&cli.log_file)
        .with_context(|| format!("failed to open {}", cli.log_file.display()))?;
    let (state, stats) =
        reconstruct(reader).with_context(|| format!("failed to read {}", cli.log_file.display()))?;

    if stats.malformed > 0 {
        warn!(
            malformed = stats.malformed,
            "dropped records with malformed fields"
        );
    }

    let summary = Summary::from_state(&state).with_context(|| {
        format!(
            "{} has no usable manager window",
            cli.log_file.display()
        )
    })?;

    if cli.json {
        let doc = serde_json::json!({
            "job_id": job_id,
            "manager": summary.manager,
            "tasks": summary.tasks,
            "workers": summary.workers,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print!("{}", summary.render(job_id.as_deref()));
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Opens the log as a plain text stream regardless of on-disk encoding.
/// The codec is keyed on the filename suffix; a corrupt compressed stream
/// surfaces as an I/O error on first read.
fn open_log(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().and_then(|ext| ext.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Jobs are conventionally stored one-per-directory, so the parent
/// directory name doubles as the job identifier.
fn derive_job_id(path: &Path) -> Option<String> {
    path.parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
}
