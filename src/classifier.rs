//! Audio/video classification for historical calls
//!
//! Ordered checks, first match wins: explicit journal marks, then keyword
//! heuristics over the call's system messages. Defaults to audio.

use crate::journal::VideoCallJournal;
use crate::models::CallEvent;
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use tracing::{debug, warn};

/// Which check decided that a call was a video call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSignal {
    ExactMark,
    WindowedMark,
    Parameter,
    MessageText,
    SystemMessageType,
    DeepParameter,
}

impl std::fmt::Display for VideoSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoSignal::ExactMark => write!(f, "exact_mark"),
            VideoSignal::WindowedMark => write!(f, "windowed_mark"),
            VideoSignal::Parameter => write!(f, "parameter"),
            VideoSignal::MessageText => write!(f, "message_text"),
            VideoSignal::SystemMessageType => write!(f, "system_message_type"),
            VideoSignal::DeepParameter => write!(f, "deep_parameter"),
        }
    }
}

/// Keywords in a message body that suggest a video call
static BODY_KEYWORDS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([r"(?i)video", r"(?i)camera", r"(?i)video call"]).expect("Invalid body keyword regex")
});

/// Any parameter key or value mentioning video or the camera
static DEEP_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)video|camera|with_video").unwrap());

static MEDIA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)media").unwrap());
static VIDEO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)video").unwrap());

/// Decides audio vs. video for a call, see module docs
pub struct VideoCallClassifier<'a> {
    journal: &'a VideoCallJournal,
    window_secs: i64,
}

impl<'a> VideoCallClassifier<'a> {
    pub fn new(journal: &'a VideoCallJournal, window_secs: i64) -> Self {
        Self { journal, window_secs }
    }

    /// True if any check says video
    pub fn is_video_call(&self, token: &str, timestamp: i64, events: &[CallEvent]) -> bool {
        self.classify(token, timestamp, events).is_some()
    }

    /// First check that says video, or `None` for audio
    pub fn classify(&self, token: &str, timestamp: i64, events: &[CallEvent]) -> Option<VideoSignal> {
        let signal = self
            .journal_signal(token, timestamp)
            .or_else(|| classify_events(events));

        match signal {
            Some(s) => debug!(token, timestamp, signal = %s, "Classified call as video"),
            None => debug!(token, timestamp, events = events.len(), "No video indicators, assuming audio"),
        }
        signal
    }

    fn journal_signal(&self, token: &str, timestamp: i64) -> Option<VideoSignal> {
        match self.journal.was_video_call(token, timestamp) {
            Ok(true) => return Some(VideoSignal::ExactMark),
            Ok(false) => {}
            Err(e) => {
                warn!(token, error = %e, "Video call journal unreadable, falling back to message heuristics");
                return None;
            }
        }

        match self.journal.was_video_call_in_range(token, timestamp, self.window_secs) {
            Ok(true) => Some(VideoSignal::WindowedMark),
            Ok(false) => None,
            Err(e) => {
                warn!(token, error = %e, "Video call journal unreadable, falling back to message heuristics");
                None
            }
        }
    }
}

/// Text heuristics over the call's messages (checks 3 to 6)
///
/// The system message type half of check 5 only fires for events built in
/// memory: `SqliteStore` loads just the known lifecycle types, none of which
/// mention video. Stored events reach check 5 through `message_type`.
pub fn classify_events(events: &[CallEvent]) -> Option<VideoSignal> {
    if events.is_empty() {
        return None;
    }

    if events.iter().any(has_video_parameter) {
        return Some(VideoSignal::Parameter);
    }

    if events
        .iter()
        .filter_map(|e| e.message.as_deref())
        .any(|text| BODY_KEYWORDS.is_match(text))
    {
        return Some(VideoSignal::MessageText);
    }

    if events.iter().any(|e| {
        VIDEO.is_match(&e.system_message_type)
            || e.message_type.as_deref().map(|t| VIDEO.is_match(t)).unwrap_or(false)
    }) {
        return Some(VideoSignal::SystemMessageType);
    }

    if events.iter().any(has_deep_video_parameter) {
        return Some(VideoSignal::DeepParameter);
    }

    None
}

fn has_video_parameter(event: &CallEvent) -> bool {
    event.parameters.values().any(|entries| {
        entries.values().any(|v| v == "video")
            || entries.get("name").map(|n| VIDEO.is_match(n)).unwrap_or(false)
            || entries.get("callType").map(|v| v == "video").unwrap_or(false)
            || entries.get("mediaType").map(|v| v == "video").unwrap_or(false)
    })
}

fn has_deep_video_parameter(event: &CallEvent) -> bool {
    event.parameters.values().flat_map(|entries| entries.iter()).any(|(key, value)| {
        DEEP_KEYWORD.is_match(key)
            || DEEP_KEYWORD.is_match(value)
            || (MEDIA.is_match(key) && VIDEO.is_match(value))
    })
}
