//! Scalar summaries for training visualisation.
//!
//! Each writer owns one log directory and appends one JSON object per line to
//! `events.jsonl` in it.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{DaeError, DaeResult};

pub const EVENTS_FILE: &str = "events.jsonl";

/// One logged scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarEvent {
    pub step: u64,
    pub tag: String,
    pub value: f64,
    /// Seconds since the Unix epoch.
    pub wall_time: f64,
}

/// Appends scalar events to a log directory.
pub struct SummaryWriter {
    dir: PathBuf,
    out: BufWriter<File>,
}

impl SummaryWriter {
    /// Creates `dir` (and its parents) and opens a fresh events file in it.
    pub fn create(dir: impl AsRef<Path>) -> DaeResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| DaeError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(EVENTS_FILE);
        let file = File::create(&path).map_err(|source| DaeError::Io { path, source })?;

        Ok(Self {
            dir,
            out: BufWriter::new(file),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> DaeResult<()> {
        let event = ScalarEvent {
            step,
            tag: tag.to_string(),
            value,
            wall_time: chrono::Utc::now().timestamp_micros() as f64 / 1e6,
        };
        serde_json::to_writer(&mut self.out, &event)?;
        self.out.write_all(b"\n").map_err(|source| self.io_error(source))
    }

    pub fn flush(&mut self) -> DaeResult<()> {
        self.out.flush().map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> DaeError {
        DaeError::Io {
            path: self.dir.join(EVENTS_FILE),
            source,
        }
    }
}

/// Reads back every event of a log directory.
pub fn read_events(dir: impl AsRef<Path>) -> DaeResult<Vec<ScalarEvent>> {
    let path = dir.as_ref().join(EVENTS_FILE);
    let contents = fs::read_to_string(&path).map_err(|source| DaeError::Io { path, source })?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(DaeError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("run").join("training");

        let mut writer = SummaryWriter::create(&log_dir).unwrap();
        writer.add_scalar("loss", 0.5, 1).unwrap();
        writer.add_scalar("loss", 0.25, 2).unwrap();
        writer.flush().unwrap();

        let events = read_events(&log_dir).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].step, 1);
        assert_eq!(events[1].value, 0.25);
        assert_eq!(events[1].tag, "loss");
    }
}
