//! Call events, conversations and derived call history records

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Parameter group name -> (key -> value)
pub type MessageParameters = BTreeMap<String, BTreeMap<String, String>>;

/// Call lifecycle system message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleType {
    Started,
    Joined,
    Left,
    Ended,
    Missed,
    Tried,
}

impl LifecycleType {
    /// System message type strings recognised as call events
    pub const SYSTEM_MESSAGE_TYPES: &'static [&'static str] = &[
        "call_started",
        "call_joined",
        "call_left",
        "call_ended",
        "call_ended_everyone",
        "call_missed",
        "call_tried",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleType::Started => "call_started",
            LifecycleType::Joined => "call_joined",
            LifecycleType::Left => "call_left",
            LifecycleType::Ended => "call_ended",
            LifecycleType::Missed => "call_missed",
            LifecycleType::Tried => "call_tried",
        }
    }
}

impl FromStr for LifecycleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "call_started" => Ok(LifecycleType::Started),
            "call_joined" => Ok(LifecycleType::Joined),
            "call_left" => Ok(LifecycleType::Left),
            "call_ended" | "call_ended_everyone" => Ok(LifecycleType::Ended),
            "call_missed" => Ok(LifecycleType::Missed),
            "call_tried" => Ok(LifecycleType::Tried),
            other => Err(Error::Parse(format!("not a call lifecycle type: {}", other))),
        }
    }
}

impl std::fmt::Display for LifecycleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted system message marking a call state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub id: i64,
    pub conversation_id: String, // Internal conversation id (grouping key)
    pub token: String,           // Public conversation token
    pub lifecycle: LifecycleType,
    pub system_message_type: String, // Raw type string as stored
    pub timestamp: i64,              // Seconds since epoch
    pub message: Option<String>,
    pub parameters: MessageParameters,
    pub message_type: Option<String>,
}

impl CallEvent {
    /// Minimal event, mostly useful for building fixtures
    pub fn new(conversation_id: &str, token: &str, lifecycle: LifecycleType, timestamp: i64) -> Self {
        Self {
            id: 0,
            conversation_id: conversation_id.to_string(),
            token: token.to_string(),
            lifecycle,
            system_message_type: lifecycle.as_str().to_string(),
            timestamp,
            message: None,
            parameters: MessageParameters::new(),
            message_type: None,
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    pub fn with_parameter(mut self, group: &str, key: &str, value: &str) -> Self {
        self.parameters
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_message_type(mut self, message_type: &str) -> Self {
        self.message_type = Some(message_type.to_string());
        self
    }
}

/// Conversation as known to the local conversation store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub internal_id: String,
    pub account_id: i64,
    pub token: String,
    pub display_name: String,
    pub actor_type: String, // "users" for one-to-one
    pub call_recording: i32,
    pub has_call: bool,
    pub call_flag: i32,
    pub call_start_time: i64,
    pub unread_messages: i64,
    pub unread_mention: bool,
    pub last_activity: i64,
}

impl Conversation {
    pub fn new(internal_id: &str, account_id: i64, token: &str, display_name: &str, actor_type: &str) -> Self {
        Self {
            internal_id: internal_id.to_string(),
            account_id,
            token: token.to_string(),
            display_name: display_name.to_string(),
            actor_type: actor_type.to_string(),
            call_recording: 0,
            has_call: false,
            call_flag: 0,
            call_start_time: 0,
            unread_messages: 0,
            unread_mention: false,
            last_activity: 0,
        }
    }

    pub fn is_group(&self) -> bool {
        self.actor_type != crate::config::ONE_TO_ONE_ACTOR_TYPE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallDirection {
    Incoming,
    Outgoing,
    Missed,
    Rejected,
    Ongoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_video_flag(is_video: bool) -> Self {
        if is_video {
            MediaKind::Video
        } else {
            MediaKind::Audio
        }
    }
}

/// Display call type: direction x media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallType {
    IncomingAudio,
    IncomingVideo,
    OutgoingAudio,
    OutgoingVideo,
    MissedAudio,
    MissedVideo,
    RejectedAudio,
    RejectedVideo,
    OngoingAudio,
    OngoingVideo,
}

impl CallType {
    pub fn new(direction: CallDirection, media: MediaKind) -> Self {
        use CallDirection::*;
        match (direction, media) {
            (Incoming, MediaKind::Audio) => CallType::IncomingAudio,
            (Incoming, MediaKind::Video) => CallType::IncomingVideo,
            (Outgoing, MediaKind::Audio) => CallType::OutgoingAudio,
            (Outgoing, MediaKind::Video) => CallType::OutgoingVideo,
            (Missed, MediaKind::Audio) => CallType::MissedAudio,
            (Missed, MediaKind::Video) => CallType::MissedVideo,
            (Rejected, MediaKind::Audio) => CallType::RejectedAudio,
            (Rejected, MediaKind::Video) => CallType::RejectedVideo,
            (Ongoing, MediaKind::Audio) => CallType::OngoingAudio,
            (Ongoing, MediaKind::Video) => CallType::OngoingVideo,
        }
    }

    pub fn direction(&self) -> CallDirection {
        match self {
            CallType::IncomingAudio | CallType::IncomingVideo => CallDirection::Incoming,
            CallType::OutgoingAudio | CallType::OutgoingVideo => CallDirection::Outgoing,
            CallType::MissedAudio | CallType::MissedVideo => CallDirection::Missed,
            CallType::RejectedAudio | CallType::RejectedVideo => CallDirection::Rejected,
            CallType::OngoingAudio | CallType::OngoingVideo => CallDirection::Ongoing,
        }
    }

    pub fn media(&self) -> MediaKind {
        match self {
            CallType::IncomingVideo
            | CallType::OutgoingVideo
            | CallType::MissedVideo
            | CallType::RejectedVideo
            | CallType::OngoingVideo => MediaKind::Video,
            _ => MediaKind::Audio,
        }
    }

    pub fn is_video(&self) -> bool {
        self.media() == MediaKind::Video
    }
}

/// Display-ready call history entry, derived fresh on every load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallHistoryRecord {
    pub id: String,
    pub conversation_name: String,
    pub conversation_token: String,
    pub call_type: CallType,
    pub duration: String,
    pub timestamp: i64,
    pub is_video_call: bool,
    pub is_missed: bool,
    pub is_group_call: bool,
}

impl CallHistoryRecord {
    /// Record built from a conversation's own call state (no lifecycle messages needed)
    ///
    /// Returns `None` for conversations that never had a call.
    pub fn from_conversation(conversation: &Conversation, is_video_call: bool) -> Option<Self> {
        if !conversation.has_call && conversation.call_start_time == 0 {
            return None;
        }

        let direction = if conversation.call_flag > 0 {
            CallDirection::Ongoing
        } else if conversation.call_start_time > 0 {
            CallDirection::Incoming
        } else {
            CallDirection::Missed
        };

        Some(Self {
            id: conversation.internal_id.clone(),
            conversation_name: conversation.display_name.clone(),
            conversation_token: conversation.token.clone(),
            call_type: CallType::new(direction, MediaKind::from_video_flag(is_video_call)),
            duration: crate::history::ZERO_DURATION.to_string(),
            timestamp: conversation.call_start_time,
            is_video_call,
            is_missed: conversation.call_start_time == 0,
            is_group_call: conversation.is_group(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_parse_case_insensitive() {
        assert_eq!("call_started".parse::<LifecycleType>().unwrap(), LifecycleType::Started);
        assert_eq!("CALL_MISSED".parse::<LifecycleType>().unwrap(), LifecycleType::Missed);
        assert_eq!("call_ended_everyone".parse::<LifecycleType>().unwrap(), LifecycleType::Ended);
        assert!("comment".parse::<LifecycleType>().is_err());
    }

    #[test]
    fn test_system_message_types_all_parse() {
        for s in LifecycleType::SYSTEM_MESSAGE_TYPES {
            assert!(s.parse::<LifecycleType>().is_ok(), "{} should parse", s);
        }
    }

    #[test]
    fn test_call_type_decomposes() {
        let ct = CallType::new(CallDirection::Missed, MediaKind::Video);
        assert_eq!(ct, CallType::MissedVideo);
        assert_eq!(ct.direction(), CallDirection::Missed);
        assert!(ct.is_video());
        assert!(!CallType::OngoingAudio.is_video());
    }

    #[test]
    fn test_call_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&CallType::OutgoingVideo).unwrap();
        assert_eq!(json, "\"OUTGOING_VIDEO\"");
    }

    #[test]
    fn test_conversation_group_detection() {
        assert!(!Conversation::new("1", 1, "tok", "Alice", "users").is_group());
        assert!(Conversation::new("2", 1, "tok2", "Team", "groups").is_group());
    }

    #[test]
    fn test_from_conversation_without_call() {
        let conv = Conversation::new("1", 1, "tok", "Alice", "users");
        assert!(CallHistoryRecord::from_conversation(&conv, false).is_none());
    }

    #[test]
    fn test_from_conversation_ongoing() {
        let mut conv = Conversation::new("1", 1, "tok", "Alice", "users");
        conv.has_call = true;
        conv.call_flag = 3;
        conv.call_start_time = 1_700_000_000;

        let record = CallHistoryRecord::from_conversation(&conv, true).unwrap();
        assert_eq!(record.call_type, CallType::OngoingVideo);
        assert_eq!(record.duration, "0:00");
        assert_eq!(record.timestamp, 1_700_000_000);
        assert!(!record.is_missed);
    }

    #[test]
    fn test_from_conversation_incoming_and_missed() {
        let mut conv = Conversation::new("1", 1, "tok", "Team", "groups");
        conv.call_start_time = 1_700_000_000;
        let record = CallHistoryRecord::from_conversation(&conv, false).unwrap();
        assert_eq!(record.call_type, CallType::IncomingAudio);
        assert!(record.is_group_call);

        conv.call_start_time = 0;
        conv.has_call = true;
        let record = CallHistoryRecord::from_conversation(&conv, false).unwrap();
        assert_eq!(record.call_type, CallType::MissedAudio);
        assert!(record.is_missed);
    }
}
