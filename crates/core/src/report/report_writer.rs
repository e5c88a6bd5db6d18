use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::analysis::domain::analysis_collection::AnalysisCollection;
use crate::analysis::domain::group_report::{group_report, GroupBy, GroupRow};
use crate::analysis::domain::error_rate::ErrorRate;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("refusing to overwrite input file {0}")]
    WouldOverwriteInput(PathBuf),
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize analysis: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// `<out_dir>/<stem>-analysis.json`
pub fn analysis_json_path(input: &Path, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}-analysis.json", stem(input)))
}

/// `<out_dir>/<stem>-report-<utterance|session|prompt>.csv`
pub fn group_report_path(input: &Path, out_dir: &Path, by: GroupBy) -> PathBuf {
    out_dir.join(format!("{}-report-{}.csv", stem(input), by.file_suffix()))
}

/// Saves the whole collection as pretty-printed JSON.
///
/// Returns `None` without writing anything when the collection is empty.
pub fn write_analysis_json(
    collection: &AnalysisCollection,
    input: &Path,
    out_dir: &Path,
) -> Result<Option<PathBuf>, ReportError> {
    if collection.is_empty() {
        log::warn!("Nothing analyzed in {}; skipping JSON output", input.display());
        return Ok(None);
    }

    let path = analysis_json_path(input, out_dir);
    let json = serde_json::to_string_pretty(collection).map_err(ReportError::Serialize)?;
    write_output(input, &path, json)?;
    Ok(Some(path))
}

/// Writes the grouped FER/PER report as CSV.
///
/// Returns `None` without writing anything when no utterance was analyzed.
pub fn write_group_report_csv(
    collection: &AnalysisCollection,
    by: GroupBy,
    input: &Path,
    out_dir: &Path,
) -> Result<Option<PathBuf>, ReportError> {
    let rows = group_report(collection, by);
    if rows.is_empty() {
        log::warn!(
            "No {} rows for {}; skipping report",
            by.file_suffix(),
            input.display()
        );
        return Ok(None);
    }

    let path = group_report_path(input, out_dir, by);
    write_output(input, &path, group_report_csv(&rows, by))?;
    Ok(Some(path))
}

/// Writes the JSON file and one CSV report per grouping.
pub fn write_reports(
    collection: &AnalysisCollection,
    input: &Path,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, ReportError> {
    let mut written = Vec::new();
    written.extend(write_analysis_json(collection, input, out_dir)?);
    for &by in GroupBy::ALL {
        written.extend(write_group_report_csv(collection, by, input, out_dir)?);
    }
    Ok(written)
}

fn group_report_csv(rows: &[GroupRow], by: GroupBy) -> String {
    let mut csv = format!("{},FER,PER,PER/FER,||PER/FER||\n", by.label());
    for row in rows {
        let fields = [
            csv_field(&row.key),
            rate_field(row.fer),
            rate_field(row.per),
            number_field(row.per_over_fer),
            number_field(row.normalized_per_over_fer),
        ];
        csv.push_str(&fields.join(","));
        csv.push('\n');
    }
    csv
}

fn rate_field(rate: ErrorRate) -> String {
    number_field(rate.value())
}

fn number_field(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transcripts".to_string())
}

fn write_output(input: &Path, path: &Path, contents: String) -> Result<(), ReportError> {
    if same_file(input, path) {
        return Err(ReportError::WouldOverwriteInput(path.to_path_buf()));
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| ReportError::CreateDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, contents).map_err(|e| ReportError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
