//! Video call journal
//!
//! Remembers which calls were started as video calls, so history entries can be
//! classified without relying on message text. Stored as a comma separated list
//! of `token|timestamp` entries in one preference key, capped to the most recent
//! marks.

use crate::config::{Config, JOURNAL_KEY};
use crate::error::{Error, Result};
use crate::prefs::PreferenceStore;
use std::collections::HashSet;
use tracing::{debug, info};

const ENTRY_SEPARATOR: char = ',';
const FIELD_SEPARATOR: char = '|';

/// "The call on conversation `token` at `timestamp` was a video call"
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoCallMark {
    pub token: String,
    pub timestamp: i64,
}

impl VideoCallMark {
    pub fn new(token: &str, timestamp: i64) -> Self {
        Self {
            token: token.to_string(),
            timestamp,
        }
    }

    fn key(&self) -> String {
        format!("{}{}{}", self.token, FIELD_SEPARATOR, self.timestamp)
    }

    /// Parse one stored entry; the timestamp follows the last separator
    fn parse(entry: &str) -> Option<Self> {
        let (token, timestamp) = entry.trim().rsplit_once(FIELD_SEPARATOR)?;
        if token.is_empty() {
            return None;
        }
        let timestamp = timestamp.parse::<i64>().ok()?;
        Some(Self::new(token, timestamp))
    }
}

/// Bounded journal of video call marks
pub struct VideoCallJournal {
    prefs: Box<dyn PreferenceStore>,
    capacity: usize,
}

impl VideoCallJournal {
    pub fn new(config: &Config, prefs: Box<dyn PreferenceStore>) -> Self {
        Self::with_capacity(prefs, config.journal_capacity)
    }

    pub fn with_capacity(prefs: Box<dyn PreferenceStore>, capacity: usize) -> Self {
        Self { prefs, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All stored marks; malformed entries are skipped
    pub fn marks(&self) -> Result<HashSet<VideoCallMark>> {
        let raw = self.prefs.get_string(JOURNAL_KEY)?.unwrap_or_default();

        let mut marks = HashSet::new();
        for entry in raw.split(ENTRY_SEPARATOR).filter(|e| !e.trim().is_empty()) {
            match VideoCallMark::parse(entry) {
                Some(mark) => {
                    marks.insert(mark);
                }
                None => debug!(entry, "Skipping malformed journal entry"),
            }
        }
        Ok(marks)
    }

    /// Record a call start; only video calls are stored
    pub fn record_call(&self, token: &str, timestamp: i64, is_video_call: bool) -> Result<()> {
        if !is_video_call {
            return Ok(());
        }
        self.mark_video_call(token, timestamp)
    }

    /// Mark the call at `timestamp` on `token` as a video call
    ///
    /// The whole journal is rewritten: deduplicated, newest first, truncated to capacity.
    /// Tokens that are empty, padded, or contain the entry separator are rejected.
    pub fn mark_video_call(&self, token: &str, timestamp: i64) -> Result<()> {
        if token.is_empty() || token.trim() != token || token.contains(ENTRY_SEPARATOR) {
            return Err(Error::Parse(format!("invalid conversation token {:?}", token)));
        }

        let mut marks = self.marks()?;
        marks.insert(VideoCallMark::new(token, timestamp));

        let mut sorted: Vec<VideoCallMark> = marks.into_iter().collect();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.token.cmp(&b.token)));
        sorted.truncate(self.capacity);

        let joined = sorted
            .iter()
            .map(VideoCallMark::key)
            .collect::<Vec<_>>()
            .join(&ENTRY_SEPARATOR.to_string());
        self.prefs.put_string(JOURNAL_KEY, &joined)?;

        debug!(token, timestamp, stored = sorted.len(), "Marked call as video call");
        Ok(())
    }

    /// Exact `(token, timestamp)` match
    pub fn was_video_call(&self, token: &str, timestamp: i64) -> Result<bool> {
        let found = self.marks()?.contains(&VideoCallMark::new(token, timestamp));
        debug!(token, timestamp, found, "Checked journal for exact video mark");
        Ok(found)
    }

    /// Any mark on `token` within `window_secs` of `timestamp` (inclusive)
    pub fn was_video_call_in_range(&self, token: &str, timestamp: i64, window_secs: i64) -> Result<bool> {
        let found = self
            .marks()?
            .iter()
            .any(|m| m.token == token && m.timestamp.abs_diff(timestamp) <= window_secs.max(0) as u64);
        debug!(token, timestamp, window_secs, found, "Checked journal for video mark in range");
        Ok(found)
    }

    /// Remove all stored marks
    pub fn clear(&self) -> Result<()> {
        self.prefs.remove(JOURNAL_KEY)?;
        info!("Cleared all video call marks");
        Ok(())
    }

    /// Human readable summary: count plus up to ten newest entries
    pub fn debug_info(&self) -> Result<String> {
        let mut marks: Vec<VideoCallMark> = self.marks()?.into_iter().collect();
        marks.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut out = format!("Video calls stored: {}", marks.len());
        for mark in marks.iter().take(10) {
            out.push_str(&format!("\nToken: {}, Timestamp: {}", mark.token, mark.timestamp));
        }
        Ok(out)
    }
}
