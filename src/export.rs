use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};

/// `<base>_<YYYYMMDD_HHMMSS>.csv` for the current local time.
pub fn unique_filename(base: &str) -> String {
    unique_filename_at(base, &Local::now())
}

pub fn unique_filename_at<Tz: TimeZone>(base: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}.csv", base, at.format("%Y%m%d_%H%M%S"))
}

/// Write a header row and data rows to `dir/filename`, creating `dir` first.
/// An existing file at that path is overwritten.
pub fn save_csv<H, R>(dir: &Path, filename: &str, headers: &[H], rows: &[R]) -> Result<PathBuf>
where
    H: AsRef<str>,
    R: AsRef<[String]>,
{
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let path = dir.join(filename);

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(&path)
        .with_context(|| format!("Failed to open {:?}", path))?;
    writer.write_record(headers.iter().map(|h| h.as_ref()))?;
    for row in rows {
        writer.write_record(row.as_ref())?;
    }
    writer.flush()?;

    Ok(path)
}
