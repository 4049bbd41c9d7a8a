//! Call history service - the entry point used by the UI layer

use crate::classifier::VideoCallClassifier;
use crate::config::{Config, JOURNAL_REGION};
use crate::error::Result;
use crate::history::CallHistoryReconstructor;
use crate::journal::VideoCallJournal;
use crate::models::{CallHistoryRecord, Conversation};
use crate::prefs::{FilePreferences, PreferenceStore};
use crate::store::{ConversationStore, MessageStore, SqliteStore};
use std::sync::Arc;
use tracing::{error, info};

/// Loads call history for one account and records video call starts
pub struct CallHistoryService {
    config: Config,
    messages: Arc<dyn MessageStore>,
    conversations: Arc<dyn ConversationStore>,
    journal: VideoCallJournal,
}

impl CallHistoryService {
    pub fn new(
        config: &Config,
        messages: Arc<dyn MessageStore>,
        conversations: Arc<dyn ConversationStore>,
        prefs: Box<dyn PreferenceStore>,
    ) -> Self {
        Self {
            config: config.clone(),
            messages,
            conversations,
            journal: VideoCallJournal::new(config, prefs),
        }
    }

    /// Service over the SQLite database and file preferences named in `config`
    pub fn open(config: &Config) -> Self {
        let store = Arc::new(SqliteStore::new(config));
        let prefs = FilePreferences::new(&config.prefs_dir, JOURNAL_REGION);
        Self::new(config, store.clone(), store, Box::new(prefs))
    }

    pub fn journal(&self) -> &VideoCallJournal {
        &self.journal
    }

    pub fn conversations(&self) -> Result<Vec<Conversation>> {
        self.conversations.conversations(self.config.account_id)
    }

    fn classifier(&self) -> VideoCallClassifier<'_> {
        VideoCallClassifier::new(&self.journal, self.config.video_mark_window_secs)
    }

    /// Call history, newest first; store failures are returned
    pub fn try_load_history(&self) -> Result<Vec<CallHistoryRecord>> {
        let events = self.messages.call_events()?;
        info!(events = events.len(), account = self.config.account_id, "Loading call history");

        let classifier = self.classifier();
        CallHistoryReconstructor::new(&classifier).reconstruct(
            events,
            self.conversations.as_ref(),
            self.config.account_id,
        )
    }

    /// Call history, newest first; a failed load shows as an empty history
    pub fn load_history(&self) -> Vec<CallHistoryRecord> {
        match self.try_load_history() {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Error loading call history");
                Vec::new()
            }
        }
    }

    /// `load_history` on a blocking worker, result handed back to the caller's task
    pub async fn load_history_in_background(self: Arc<Self>) -> Result<Vec<CallHistoryRecord>> {
        let records = tokio::task::spawn_blocking(move || self.load_history()).await?;
        Ok(records)
    }

    /// Remember that the call starting now on `token` is a video call
    pub fn mark_video_call(&self, token: &str, timestamp: i64) -> Result<()> {
        info!(token, timestamp, "Marking call as video call");
        self.journal.mark_video_call(token, timestamp)
    }

    /// Called before a call is started; audio calls leave no trace
    pub fn record_call_start(&self, token: &str, timestamp: i64, is_video_call: bool) -> Result<()> {
        self.journal.record_call(token, timestamp, is_video_call)
    }

    /// Records for conversations with a call in progress
    pub fn active_calls(&self) -> Result<Vec<CallHistoryRecord>> {
        let classifier = self.classifier();
        let mut records = Vec::new();

        for conversation in self.conversations()? {
            if conversation.call_flag <= 0 {
                continue;
            }
            let events = self.messages.messages_for_conversation(&conversation.internal_id)?;
            let is_video = classifier.is_video_call(&conversation.token, conversation.call_start_time, &events);
            if let Some(record) = CallHistoryRecord::from_conversation(&conversation, is_video) {
                records.push(record);
            }
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}
