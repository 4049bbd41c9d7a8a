//! Configuration and paths

use std::path::{Path, PathBuf};

/// All configurable paths and constants
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub messages_db: PathBuf,
    pub prefs_dir: PathBuf,
    pub account_id: i64,
    pub journal_capacity: usize,
    pub video_mark_window_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("talk-call-history");
        Self::with_data_dir(&data_dir)
    }
}

impl Config {
    /// Config rooted at an explicit data directory
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            messages_db: data_dir.join("talk.db"),
            prefs_dir: data_dir.join("prefs"),
            account_id: DEFAULT_ACCOUNT_ID,
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
            video_mark_window_secs: DEFAULT_VIDEO_MARK_WINDOW_SECS,
        }
    }

    /// Create config for testing with custom paths
    pub fn for_test(temp_dir: &Path) -> Self {
        Self {
            data_dir: temp_dir.to_path_buf(),
            messages_db: temp_dir.join("talk.db"),
            prefs_dir: temp_dir.join("prefs"),
            account_id: DEFAULT_ACCOUNT_ID,
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
            video_mark_window_secs: DEFAULT_VIDEO_MARK_WINDOW_SECS,
        }
    }
}

pub const DEFAULT_ACCOUNT_ID: i64 = 1;

/// Most recent video marks kept in the journal
pub const DEFAULT_JOURNAL_CAPACITY: usize = 100;

/// Tolerance when matching a journal mark against a call timestamp (seconds, inclusive)
pub const DEFAULT_VIDEO_MARK_WINDOW_SECS: i64 = 120;

/// Preference region and key backing the video call journal
pub const JOURNAL_REGION: &str = "video_call_tracker";
pub const JOURNAL_KEY: &str = "video_calls";

/// Actor type of one-to-one conversations; anything else is a group
pub const ONE_TO_ONE_ACTOR_TYPE: &str = "users";
