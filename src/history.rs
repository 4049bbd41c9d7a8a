//! Call history reconstruction
//!
//! Reduces the flat list of call lifecycle messages to one record per
//! conversation, newest call first.

use crate::classifier::VideoCallClassifier;
use crate::error::Result;
use crate::models::{
    CallDirection, CallEvent, CallHistoryRecord, CallType, Conversation, LifecycleType, MediaKind,
};
use crate::store::ConversationStore;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Duration shown when no start/end pair is known
pub const ZERO_DURATION: &str = "0:00";

/// Display direction for the most recent lifecycle event of a call
pub fn direction_for(lifecycle: LifecycleType) -> CallDirection {
    match lifecycle {
        LifecycleType::Joined => CallDirection::Incoming,
        LifecycleType::Missed => CallDirection::Missed,
        // TODO: left/ended/tried say nothing about who placed the call; needs the actor of the call_started message
        LifecycleType::Started | LifecycleType::Left | LifecycleType::Ended | LifecycleType::Tried => {
            CallDirection::Outgoing
        }
    }
}

/// `M:SS`, minutes unbounded
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Duration between the latest end and the latest start not after it
pub fn call_duration(events: &[CallEvent]) -> String {
    let ended = events
        .iter()
        .filter(|e| e.lifecycle == LifecycleType::Ended)
        .map(|e| e.timestamp)
        .max();

    let ended = match ended {
        Some(ts) => ts,
        None => return ZERO_DURATION.to_string(),
    };

    let started = events
        .iter()
        .filter(|e| e.lifecycle == LifecycleType::Started && e.timestamp <= ended)
        .map(|e| e.timestamp)
        .max();

    match started {
        Some(start) => format_duration(ended.saturating_sub(start)),
        None => ZERO_DURATION.to_string(),
    }
}

/// Builds call history records from lifecycle events
pub struct CallHistoryReconstructor<'a> {
    classifier: &'a VideoCallClassifier<'a>,
}

impl<'a> CallHistoryReconstructor<'a> {
    pub fn new(classifier: &'a VideoCallClassifier<'a>) -> Self {
        Self { classifier }
    }

    /// One record per conversation with events, sorted newest first
    ///
    /// Conversations missing from the store are skipped.
    pub fn reconstruct(
        &self,
        events: Vec<CallEvent>,
        conversations: &dyn ConversationStore,
        account_id: i64,
    ) -> Result<Vec<CallHistoryRecord>> {
        let mut groups: BTreeMap<String, Vec<CallEvent>> = BTreeMap::new();
        for event in events {
            groups.entry(event.conversation_id.clone()).or_default().push(event);
        }

        let mut records = Vec::with_capacity(groups.len());
        for (conversation_id, group) in &groups {
            let conversation = match conversations.conversation_by_internal_id(account_id, conversation_id)? {
                Some(c) => c,
                None => {
                    debug!(conversation_id = %conversation_id, "No conversation for call events, skipping");
                    continue;
                }
            };

            if let Some(record) = self.record_for_group(&conversation, group) {
                records.push(record);
            }
        }

        // Stable sort keeps conversation id order for equal timestamps
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        info!(records = records.len(), conversations = groups.len(), "Reconstructed call history");
        Ok(records)
    }

    /// Reduce one conversation's events; `None` only for an empty group
    pub fn record_for_group(&self, conversation: &Conversation, events: &[CallEvent]) -> Option<CallHistoryRecord> {
        let latest = events.iter().max_by_key(|e| e.timestamp)?;

        let is_video_call = self.classifier.is_video_call(&latest.token, latest.timestamp, events);
        let direction = direction_for(latest.lifecycle);

        debug!(
            conversation = %conversation.display_name,
            lifecycle = %latest.lifecycle,
            timestamp = latest.timestamp,
            is_video_call,
            "Processed call group"
        );

        Some(CallHistoryRecord {
            id: conversation.internal_id.clone(),
            conversation_name: conversation.display_name.clone(),
            conversation_token: conversation.token.clone(),
            call_type: CallType::new(direction, MediaKind::from_video_flag(is_video_call)),
            duration: call_duration(events),
            timestamp: latest.timestamp,
            is_video_call,
            is_missed: latest.lifecycle == LifecycleType::Missed,
            is_group_call: conversation.is_group(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::VideoCallJournal;
    use crate::prefs::MemoryPreferences;
    use std::collections::HashMap;
    use proptest::prelude::*;

    /// Conversation store backed by a map
    struct MapStore(HashMap<String, Conversation>);

    impl ConversationStore for MapStore {
        fn conversation_by_internal_id(&self, _account_id: i64, internal_id: &str) -> Result<Option<Conversation>> {
            Ok(self.0.get(internal_id).cloned())
        }

        fn conversation_by_token(&self, _account_id: i64, token: &str) -> Result<Option<Conversation>> {
            Ok(self.0.values().find(|c| c.token == token).cloned())
        }

        fn conversations(&self, _account_id: i64) -> Result<Vec<Conversation>> {
            Ok(self.0.values().cloned().collect())
        }
    }

    fn store() -> MapStore {
        let mut map = HashMap::new();
        map.insert("c1".to_string(), Conversation::new("c1", 1, "abc", "Alice", "users"));
        map.insert("c2".to_string(), Conversation::new("c2", 1, "def", "Team", "groups"));
        MapStore(map)
    }

    fn journal() -> VideoCallJournal {
        VideoCallJournal::with_capacity(Box::new(MemoryPreferences::new()), 100)
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(125), "2:05");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(4503), "75:03");
        assert_eq!(format_duration(-5), "0:00");
    }

    #[test]
    fn test_direction_table() {
        assert_eq!(direction_for(LifecycleType::Started), CallDirection::Outgoing);
        assert_eq!(direction_for(LifecycleType::Joined), CallDirection::Incoming);
        assert_eq!(direction_for(LifecycleType::Left), CallDirection::Outgoing);
        assert_eq!(direction_for(LifecycleType::Ended), CallDirection::Outgoing);
        assert_eq!(direction_for(LifecycleType::Missed), CallDirection::Missed);
        assert_eq!(direction_for(LifecycleType::Tried), CallDirection::Outgoing);
    }

    #[test]
    fn test_duration_needs_start_and_end() {
        let start = CallEvent::new("c1", "abc", LifecycleType::Started, 1000);
        let end = CallEvent::new("c1", "abc", LifecycleType::Ended, 1125);
        let joined = CallEvent::new("c1", "abc", LifecycleType::Joined, 1010);

        assert_eq!(call_duration(&[start.clone(), end.clone()]), "2:05");
        assert_eq!(call_duration(&[start.clone(), joined.clone()]), "0:00");
        assert_eq!(call_duration(&[end.clone(), joined]), "0:00");
        assert_eq!(call_duration(&[]), "0:00");

        // A start after the last end is a new call, not this one
        let late_start = CallEvent::new("c1", "abc", LifecycleType::Started, 2000);
        assert_eq!(call_duration(&[start, end, late_start]), "2:05");
    }

    #[test]
    fn test_duration_extreme_timestamps() {
        let start = CallEvent::new("c1", "abc", LifecycleType::Started, i64::MIN);
        let end = CallEvent::new("c1", "abc", LifecycleType::Ended, i64::MAX);
        assert_eq!(call_duration(&[start, end]), format_duration(i64::MAX));
    }

    #[test]
    fn test_started_ended_scenario() {
        let journal = journal();
        let classifier = VideoCallClassifier::new(&journal, 120);
        let reconstructor = CallHistoryReconstructor::new(&classifier);

        let events = vec![
            CallEvent::new("c1", "abc", LifecycleType::Started, 1000),
            CallEvent::new("c1", "abc", LifecycleType::Ended, 1125),
        ];
        let records = reconstructor.reconstruct(events, &store(), 1).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.duration, "2:05");
        assert_eq!(record.timestamp, 1125);
        assert_eq!(record.call_type, CallType::OutgoingAudio);
        assert!(!record.is_missed);
        assert!(!record.is_group_call);
        assert_eq!(record.conversation_token, "abc");
    }

    #[test]
    fn test_scenario_with_video_mark() {
        let journal = journal();
        journal.mark_video_call("abc", 1100).unwrap();
        let classifier = VideoCallClassifier::new(&journal, 120);
        let reconstructor = CallHistoryReconstructor::new(&classifier);

        let events = vec![
            CallEvent::new("c1", "abc", LifecycleType::Started, 1000),
            CallEvent::new("c1", "abc", LifecycleType::Ended, 1125),
        ];
        let records = reconstructor.reconstruct(events, &store(), 1).unwrap();
        assert_eq!(records[0].call_type, CallType::OutgoingVideo);
        assert!(records[0].is_video_call);
    }

    #[test]
    fn test_groups_sorted_newest_first() {
        let journal = journal();
        let classifier = VideoCallClassifier::new(&journal, 120);
        let reconstructor = CallHistoryReconstructor::new(&classifier);

        let events = vec![
            CallEvent::new("c1", "abc", LifecycleType::Joined, 500),
            CallEvent::new("c2", "def", LifecycleType::Missed, 900),
            CallEvent::new("c1", "abc", LifecycleType::Left, 300),
        ];
        let records = reconstructor.reconstruct(events, &store(), 1).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "c2");
        assert_eq!(records[0].call_type, CallType::MissedAudio);
        assert!(records[0].is_missed);
        assert!(records[0].is_group_call);
        assert_eq!(records[1].id, "c1");
        assert_eq!(records[1].timestamp, 500);
        assert_eq!(records[1].call_type, CallType::IncomingAudio);
    }

    #[test]
    fn test_unknown_conversation_skipped() {
        let journal = journal();
        let classifier = VideoCallClassifier::new(&journal, 120);
        let reconstructor = CallHistoryReconstructor::new(&classifier);

        let events = vec![
            CallEvent::new("missing", "zzz", LifecycleType::Started, 10),
            CallEvent::new("c1", "abc", LifecycleType::Started, 5),
        ];
        let records = reconstructor.reconstruct(events, &store(), 1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "c1");
    }

    #[test]
    fn test_no_events_no_records() {
        let journal = journal();
        let classifier = VideoCallClassifier::new(&journal, 120);
        let reconstructor = CallHistoryReconstructor::new(&classifier);

        assert!(reconstructor.reconstruct(Vec::new(), &store(), 1).unwrap().is_empty());
        let conv = Conversation::new("c1", 1, "abc", "Alice", "users");
        assert!(reconstructor.record_for_group(&conv, &[]).is_none());
    }

    fn lifecycle_strategy() -> impl Strategy<Value = LifecycleType> {
        prop::sample::select(vec![
            LifecycleType::Started,
            LifecycleType::Joined,
            LifecycleType::Left,
            LifecycleType::Ended,
            LifecycleType::Missed,
            LifecycleType::Tried,
        ])
    }

    proptest! {
        /// One record per known conversation, stamped with its latest event, newest first
        #[test]
        fn prop_one_record_per_group_at_group_max(
            raw in prop::collection::vec((0usize..3, lifecycle_strategy(), -10_000i64..10_000), 0..40)
        ) {
            let ids = ["c1", "c2", "missing"];
            let tokens = ["abc", "def", "zzz"];
            let events: Vec<CallEvent> = raw
                .iter()
                .map(|(i, lifecycle, ts)| CallEvent::new(ids[*i], tokens[*i], *lifecycle, *ts))
                .collect();

            let journal = journal();
            let classifier = VideoCallClassifier::new(&journal, 120);
            let reconstructor = CallHistoryReconstructor::new(&classifier);
            let records = reconstructor.reconstruct(events.clone(), &store(), 1).unwrap();

            let mut expected: BTreeMap<&str, i64> = BTreeMap::new();
            for e in events.iter().filter(|e| e.conversation_id != "missing") {
                let max = expected.entry(e.conversation_id.as_str()).or_insert(e.timestamp);
                *max = (*max).max(e.timestamp);
            }

            prop_assert_eq!(records.len(), expected.len());
            for record in &records {
                prop_assert_eq!(Some(&record.timestamp), expected.get(record.id.as_str()));
            }
            prop_assert!(records.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        }
    }
}
