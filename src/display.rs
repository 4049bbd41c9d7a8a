//! Presentation helpers for call history rows

use crate::models::{CallDirection, CallHistoryRecord, CallType, MediaKind};
use chrono::{DateTime, TimeZone, Utc};

/// Icon shown next to a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallIcon {
    Phone,
    Camera,
}

/// Colour family of a call row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTone {
    Green,
    Blue,
    Red,
    Orange,
    LightGreen,
}

impl CallType {
    pub fn label(&self) -> &'static str {
        match self {
            CallType::IncomingAudio => "Incoming",
            CallType::IncomingVideo => "Incoming Video",
            CallType::OutgoingAudio => "Outgoing",
            CallType::OutgoingVideo => "Outgoing Video",
            CallType::MissedAudio => "Missed",
            CallType::MissedVideo => "Missed Video",
            CallType::RejectedAudio => "Rejected",
            CallType::RejectedVideo => "Rejected Video",
            CallType::OngoingAudio => "Ongoing",
            CallType::OngoingVideo => "Ongoing Video",
        }
    }

    pub fn icon(&self) -> CallIcon {
        match self.media() {
            MediaKind::Audio => CallIcon::Phone,
            MediaKind::Video => CallIcon::Camera,
        }
    }

    pub fn tone(&self) -> CallTone {
        match self.direction() {
            CallDirection::Incoming => CallTone::Green,
            CallDirection::Outgoing => CallTone::Blue,
            CallDirection::Missed => CallTone::Red,
            CallDirection::Rejected => CallTone::Orange,
            CallDirection::Ongoing => CallTone::LightGreen,
        }
    }
}

/// Convert epoch seconds to DateTime<Utc>, clamping out-of-range values to the epoch
pub fn to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// "Just now", "5 min ago", "3 hr ago", "2 day ago", else "Mar 05"
pub fn format_relative(ts: i64, now: DateTime<Utc>) -> String {
    let then = to_datetime(ts);
    let minutes = (now - then).num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{} min ago", minutes)
    } else if hours < 24 {
        format!("{} hr ago", hours)
    } else if days < 7 {
        format!("{} day ago", days)
    } else {
        then.format("%b %d").to_string()
    }
}

/// One line per record, as printed by the CLI
pub fn render_row(record: &CallHistoryRecord, now: DateTime<Utc>) -> String {
    let mut badges = Vec::new();
    if record.is_video_call {
        badges.push("video");
    }
    if record.is_group_call {
        badges.push("group");
    }
    let badges = if badges.is_empty() {
        String::new()
    } else {
        format!(" [{}]", badges.join(", "))
    };

    format!(
        "{:<24} {:<15} {:>6}  {}{}",
        record.conversation_name,
        record.call_type.label(),
        record.duration,
        format_relative(record.timestamp, now),
        badges
    )
}
