//! JSON serialization of [`RunReport`]s.

use crate::models::RunReport;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

const LATEST: &str = "latest.json";

/// Write `report` to `{output_dir}/{date}/{HH-MM-SS}.json` (UTC start time)
/// and refresh `{output_dir}/latest.json`.
///
/// Returns the path of the dated file.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.as_ref().display()))]
pub async fn write_report(
    report: &RunReport,
    output_dir: impl AsRef<Path>,
) -> Result<PathBuf, Box<dyn Error>> {
    let output_dir = output_dir.as_ref();
    let json = serde_json::to_string_pretty(report)?;

    let dated_dir = output_dir.join(report.started_at.format("%Y-%m-%d").to_string());
    info!(dir = %dated_dir.display(), "Ensuring report directory exists");
    if let Err(e) = fs::create_dir_all(&dated_dir).await {
        error!(dir = %dated_dir.display(), error = %e, "Failed to create report dir");
        return Err(e.into());
    }

    let path = dated_dir.join(format!("{}.json", report.started_at.format("%H-%M-%S")));
    fs::write(&path, &json).await?;
    fs::write(output_dir.join(LATEST), &json).await?;
    info!(
        path = %path.display(),
        accepted = report.accepted_count(),
        "Wrote run report"
    );
    Ok(path)
}
