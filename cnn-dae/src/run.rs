//! Run identity: the optional tag and start timestamp that qualify every log
//! directory, checkpoint and plot of one run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Extension written by the named MessagePack recorder.
pub const CHECKPOINT_EXTENSION: &str = "mpk";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    tag: Option<String>,
    timestamp: String,
}

impl RunContext {
    /// Creates a context stamped with the current local time.
    pub fn new(tag: Option<String>) -> Self {
        Self::at(tag, Local::now())
    }

    pub fn at(tag: Option<String>, time: DateTime<Local>) -> Self {
        Self {
            tag,
            timestamp: time.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// The tag as it appears inside directory and checkpoint names.
    pub fn tag_string(&self) -> &str {
        self.tag.as_deref().unwrap_or("")
    }

    pub fn train_log_dir(&self, log_directory: &Path) -> PathBuf {
        log_directory.join(format!(
            "cnn-ae-{}-training-{}",
            self.tag_string(),
            self.timestamp
        ))
    }

    pub fn validation_log_dir(&self, log_directory: &Path) -> PathBuf {
        log_directory.join(format!(
            "cnn-ae-{}-validation-{}",
            self.tag_string(),
            self.timestamp
        ))
    }

    /// Final checkpoint file inside the training log directory.
    ///
    /// The extension is part of the name so a recorder replacing the
    /// extension never truncates a tag that contains a dot.
    pub fn checkpoint_path(&self, log_directory: &Path, num_epochs: usize) -> PathBuf {
        self.train_log_dir(log_directory).join(format!(
            "cnn-ae-{}-{}-ep{}-final.{CHECKPOINT_EXTENSION}",
            self.tag_string(),
            self.timestamp,
            num_epochs
        ))
    }

    /// Plot file name; an absent tag renders as `None`.
    pub fn plot_name(&self, kind: &str) -> String {
        format!(
            "cnn_autoencoder_{kind}_{}.png",
            self.tag.as_deref().unwrap_or("None")
        )
    }
}
