use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

/// Capture file name for a wall-clock start time, e.g. `capture_03-14-2024_091500.csv`.
pub fn capture_file_name<Tz: TimeZone>(started_at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    started_at.format("capture_%m-%d-%Y_%H%M%S.csv").to_string()
}

/// Path in `dir` for a capture starting at `started_at`.
///
/// When two captures start within the same second, `_2`, `_3`, ... is
/// appended to the stem so an earlier file is never overwritten.
pub fn unique_capture_path<Tz: TimeZone>(dir: &Path, started_at: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    let name = capture_file_name(started_at);
    let candidate = dir.join(&name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = name.trim_end_matches(".csv");
    (2u32..)
        .map(|n| dir.join(format!("{}_{}.csv", stem, n)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
