//! # Config
//!
//! Tunable thresholds for the LSM storage engine.
//!
//! Every knob here maps directly to a flush/compaction trigger documented in
//! the engine crate: [`Config::mem_max_bytes`] gates the memtable-to-SSTable
//! flush, [`Config::level0_max_files`] gates level-0 compaction, and
//! [`Config::levels_max`] bounds how deep the tree goes (tombstones are only
//! dropped once they reach the deepest level).
//!
//! ## Example
//! ```rust
//! use config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.mem_max_bytes, 4 * 1024 * 1024);
//! assert_eq!(cfg.level0_max_files, 4);
//! assert_eq!(cfg.levels_max, 7);
//! ```

use thiserror::Error;

/// Errors raised when a [`Config`] is constructed with nonsensical values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `mem_max_bytes` was zero.
    #[error("mem_max_bytes must be > 0")]
    ZeroMemMaxBytes,

    /// `level0_max_files` was zero (there would never be a trigger to compact).
    #[error("level0_max_files must be > 0")]
    ZeroLevel0MaxFiles,

    /// `levels_max` was zero or one (no room for a level-0-to-level-1 promotion).
    #[error("levels_max must be >= 2")]
    TooFewLevels,

    /// `block_size_bytes` was zero.
    #[error("block_size_bytes must be > 0")]
    ZeroBlockSizeBytes,
}

/// Engine-wide tuning knobs.
///
/// All fields are public so callers can construct a `Config` with struct
/// update syntax (`Config { mem_max_bytes: 1024, ..Config::default() }`) or
/// go through [`Config::validated`] to catch obviously broken values early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// MemTable flush threshold, in approximate bytes of keys + values.
    pub mem_max_bytes: usize,
    /// Number of Level-0 files that triggers a Level-0 -> Level-1 compaction.
    pub level0_max_files: usize,
    /// Number of levels in the tree (Level 0 .. levels_max - 1). Tombstones
    /// are only physically dropped once they reach `levels_max - 1`.
    pub levels_max: usize,
    /// Target size, in bytes, of a single sorted-table data block.
    pub block_size_bytes: usize,
}

/// Default MemTable flush threshold: 4 MiB.
pub const DEFAULT_MEM_MAX_BYTES: usize = 4 * 1024 * 1024;
/// Default Level-0 compaction trigger: 4 files.
pub const DEFAULT_LEVEL0_MAX_FILES: usize = 4;
/// Default tree depth: 7 levels (0..=6).
pub const DEFAULT_LEVELS_MAX: usize = 7;
/// Default sorted-table block size target: 4 KiB.
pub const DEFAULT_BLOCK_SIZE_BYTES: usize = 4096;

impl Default for Config {
    fn default() -> Self {
        Self {
            mem_max_bytes: DEFAULT_MEM_MAX_BYTES,
            level0_max_files: DEFAULT_LEVEL0_MAX_FILES,
            levels_max: DEFAULT_LEVELS_MAX,
            block_size_bytes: DEFAULT_BLOCK_SIZE_BYTES,
        }
    }
}

impl Config {
    /// Returns `self` after checking every field for an obviously invalid value.
    ///
    /// This does not attempt to be exhaustive about *performance-sensible*
    /// configurations -- only ones that would make the engine's invariants
    /// impossible to uphold (e.g. a zero-sized flush threshold that would
    /// flush after every single write into an ever-growing pile of L0 files,
    /// or a single-level tree with no room to compact into).
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.mem_max_bytes == 0 {
            return Err(ConfigError::ZeroMemMaxBytes);
        }
        if self.level0_max_files == 0 {
            return Err(ConfigError::ZeroLevel0MaxFiles);
        }
        if self.levels_max < 2 {
            return Err(ConfigError::TooFewLevels);
        }
        if self.block_size_bytes == 0 {
            return Err(ConfigError::ZeroBlockSizeBytes);
        }
        Ok(self)
    }

    /// The index of the deepest level, i.e. `levels_max - 1`.
    ///
    /// Tombstones are only physically discarded by compaction into this
    /// level (see the engine's compaction module).
    #[must_use]
    pub fn deepest_level(&self) -> usize {
        self.levels_max - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference() {
        let cfg = Config::default();
        assert_eq!(cfg.mem_max_bytes, 4 * 1024 * 1024);
        assert_eq!(cfg.level0_max_files, 4);
        assert_eq!(cfg.levels_max, 7);
        assert_eq!(cfg.block_size_bytes, 4096);
        assert!(cfg.validated().is_ok());
    }

    #[test]
    fn deepest_level_is_levels_max_minus_one() {
        let cfg = Config {
            levels_max: 3,
            ..Config::default()
        };
        assert_eq!(cfg.deepest_level(), 2);
    }

    #[test]
    fn rejects_zero_mem_max_bytes() {
        let cfg = Config {
            mem_max_bytes: 0,
            ..Config::default()
        };
        assert_eq!(cfg.validated(), Err(ConfigError::ZeroMemMaxBytes));
    }

    #[test]
    fn rejects_zero_level0_max_files() {
        let cfg = Config {
            level0_max_files: 0,
            ..Config::default()
        };
        assert_eq!(cfg.validated(), Err(ConfigError::ZeroLevel0MaxFiles));
    }

    #[test]
    fn rejects_single_level_tree() {
        let cfg = Config {
            levels_max: 1,
            ..Config::default()
        };
        assert_eq!(cfg.validated(), Err(ConfigError::TooFewLevels));
    }

    #[test]
    fn rejects_zero_block_size() {
        let cfg = Config {
            block_size_bytes: 0,
            ..Config::default()
        };
        assert_eq!(cfg.validated(), Err(ConfigError::ZeroBlockSizeBytes));
    }
}
