//! Process-level setup: logging and the compute thread pool.

use std::num::NonZeroUsize;

use tracing_subscriber::EnvFilter;

use crate::error::{DaeError, DaeResult};

/// Thread-count hint taken from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadHint {
    /// Leave the thread pool at its default size.
    Unset,
    Threads(NonZeroUsize),
}

impl ThreadHint {
    /// Interprets the `--num_cores` flag: `-1` leaves the pool unset, positive
    /// values fix its size.
    pub fn from_flag(num_cores: i64) -> DaeResult<Self> {
        match num_cores {
            -1 => Ok(Self::Unset),
            n if n > 0 => NonZeroUsize::new(n as usize)
                .map(Self::Threads)
                .ok_or_else(|| DaeError::InvalidConfiguration {
                    reason: format!("Invalid number of cores: {n}"),
                }),
            n => Err(DaeError::InvalidConfiguration {
                reason: format!("Number of cores must be positive or -1 to leave unset, got {n}"),
            }),
        }
    }

    /// Sizes the global rayon pool that CPU tensor kernels run on.
    pub fn apply(self) -> DaeResult<()> {
        match self {
            Self::Unset => Ok(()),
            Self::Threads(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n.get())
                .build_global()
                .map_err(|e| DaeError::ThreadPool {
                    reason: e.to_string(),
                }),
        }
    }
}

/// Installs the global `tracing` subscriber, honouring `RUST_LOG` and
/// defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
