//! Incremental collection configuration and state.
//!
//! A collection cycle is split into bounded steps that interleave with the
//! application. Each step traces objects until its time budget runs out or
//! the trace queue drains; the final step swaps the replacement store in.

#![allow(missing_docs, clippy::must_use_candidate)]

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GcError, Result};

pub const DEFAULT_MAX_STEP_TIME: Duration = Duration::from_millis(100);
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 1000;
pub const OUT_PATH_SUFFIX: &str = ".gc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectPhase {
    #[default]
    Idle,
    Collecting,
}

impl CollectPhase {
    #[must_use]
    pub const fn is_valid_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Idle, Self::Collecting) | (Self::Collecting, Self::Idle)
        )
    }
}

/// Outcome of one [`Collector::step`](crate::Collector::step).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// No cycle is in progress; nothing was done.
    Idle,
    /// The budget ran out with work left in the queue.
    Pending {
        objects_marked: usize,
        queued: usize,
    },
    /// The queue drained and the replacement store is now live.
    Complete {
        total_objects_marked: usize,
        total_steps: usize,
    },
}

impl StepResult {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// Collector tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Wall-clock budget of one step. A step always traces at least one
    /// object, then stops once this much time has passed.
    pub max_step_time: Duration,
    /// Commit the replacement store and report progress every this many
    /// traced objects.
    pub checkpoint_interval: usize,
    /// Location of the replacement store. Defaults to the live store's path
    /// with `.gc` appended.
    pub out_path: Option<PathBuf>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_step_time: DEFAULT_MAX_STEP_TIME,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            out_path: None,
        }
    }
}

impl CollectorConfig {
    /// Where the replacement store for a live store at `live_path` goes.
    #[must_use]
    pub fn resolve_out_path(&self, live_path: &Path) -> PathBuf {
        self.out_path.clone().unwrap_or_else(|| {
            let mut name = OsString::from(live_path.as_os_str());
            name.push(OUT_PATH_SUFFIX);
            PathBuf::from(name)
        })
    }

    /// Checks the configuration against the live store's location.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::InvalidConfig`] for a zero checkpoint interval or a
    /// replacement path equal to the live path.
    pub fn validate(&self, live_path: &Path) -> Result<()> {
        if self.checkpoint_interval == 0 {
            return Err(GcError::InvalidConfig {
                detail: "checkpoint_interval must be at least 1".to_string(),
            });
        }
        if self.resolve_out_path(live_path) == live_path {
            return Err(GcError::InvalidConfig {
                detail: format!(
                    "replacement store path equals live store path '{}'",
                    live_path.display()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        assert!(CollectPhase::Idle.is_valid_transition(CollectPhase::Collecting));
        assert!(CollectPhase::Collecting.is_valid_transition(CollectPhase::Idle));
        assert!(!CollectPhase::Idle.is_valid_transition(CollectPhase::Idle));
        assert!(!CollectPhase::Collecting.is_valid_transition(CollectPhase::Collecting));
    }

    #[test]
    fn test_default_out_path() {
        let config = CollectorConfig::default();
        assert_eq!(
            config.resolve_out_path(Path::new("/data/objects.pdb")),
            PathBuf::from("/data/objects.pdb.gc")
        );
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let live = Path::new("/data/objects.pdb");
        assert!(CollectorConfig::default().validate(live).is_ok());

        let zero = CollectorConfig {
            checkpoint_interval: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero.validate(live),
            Err(GcError::InvalidConfig { .. })
        ));

        let same = CollectorConfig {
            out_path: Some(live.to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            same.validate(live),
            Err(GcError::InvalidConfig { .. })
        ));
    }
}
