//! Home screen tabs
//!
//! Each tab implements [`RefreshableTab`]; [`HomeTab`] picks the implementation
//! for the selected tab, so the home screen never inspects concrete tab types.

use crate::config::ONE_TO_ONE_ACTOR_TYPE;
use crate::display::{format_relative, render_row};
use crate::error::{Error, Result};
use crate::models::{CallHistoryRecord, Conversation};
use crate::service::CallHistoryService;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Unread/mention toggles of the conversation filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterState {
    pub mention: bool,
    pub unread: bool,
}

/// Capabilities every home screen tab offers
pub trait RefreshableTab {
    fn refresh(&mut self) -> Result<()>;

    /// Case-insensitive name filter; empty query shows everything
    fn filter(&mut self, query: &str);

    fn set_filter_state(&mut self, state: FilterState);

    fn visible_len(&self) -> usize;

    fn rows(&self, now: DateTime<Utc>) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabKind {
    Chats,
    Groups,
    Calls,
}

impl FromStr for TabKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chats" => Ok(TabKind::Chats),
            "groups" => Ok(TabKind::Groups),
            "calls" => Ok(TabKind::Calls),
            other => Err(Error::Parse(format!("unknown tab: {}", other))),
        }
    }
}

/// Immutable home screen settings, fixed at construction
#[derive(Debug, Clone)]
pub struct HomeConfig {
    pub initial_tab: TabKind,
    /// Shorter search queries clear the filter
    pub search_min_chars: usize,
}

impl Default for HomeConfig {
    fn default() -> Self {
        Self {
            initial_tab: TabKind::Chats,
            search_min_chars: 1,
        }
    }
}

fn matches_query(name: &str, query: &Option<String>) -> bool {
    match query {
        Some(q) => name.to_lowercase().contains(q),
        None => true,
    }
}

fn normalize_query(query: &str) -> Option<String> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        None
    } else {
        Some(q)
    }
}

/// One-to-one chats or group conversations
pub struct ConversationsTab {
    service: Arc<CallHistoryService>,
    groups: bool,
    all: Vec<Conversation>,
    query: Option<String>,
    state: FilterState,
}

impl ConversationsTab {
    pub fn chats(service: Arc<CallHistoryService>) -> Self {
        Self::new(service, false)
    }

    pub fn groups(service: Arc<CallHistoryService>) -> Self {
        Self::new(service, true)
    }

    fn new(service: Arc<CallHistoryService>, groups: bool) -> Self {
        Self {
            service,
            groups,
            all: Vec::new(),
            query: None,
            state: FilterState::default(),
        }
    }

    fn passes_state(&self, c: &Conversation) -> bool {
        let one_to_one = c.actor_type == ONE_TO_ONE_ACTOR_TYPE;
        let mention_ok = !self.state.mention || c.unread_mention || (one_to_one && c.unread_messages > 0);
        let unread_ok = !self.state.unread || c.unread_messages > 0;
        mention_ok && unread_ok
    }

    pub fn visible(&self) -> Vec<&Conversation> {
        self.all
            .iter()
            .filter(|c| matches_query(&c.display_name, &self.query))
            .filter(|c| self.passes_state(c))
            .collect()
    }
}

impl RefreshableTab for ConversationsTab {
    fn refresh(&mut self) -> Result<()> {
        let mut conversations: Vec<Conversation> = self
            .service
            .conversations()?
            .into_iter()
            .filter(|c| c.is_group() == self.groups)
            .collect();
        conversations.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        debug!(groups = self.groups, count = conversations.len(), "Refreshed conversations tab");
        self.all = conversations;
        Ok(())
    }

    fn filter(&mut self, query: &str) {
        self.query = normalize_query(query);
    }

    fn set_filter_state(&mut self, state: FilterState) {
        self.state = state;
    }

    fn visible_len(&self) -> usize {
        self.visible().len()
    }

    fn rows(&self, now: DateTime<Utc>) -> Vec<String> {
        self.visible()
            .into_iter()
            .map(|c| {
                let unread = if c.unread_messages > 0 {
                    format!(" ({} unread)", c.unread_messages)
                } else {
                    String::new()
                };
                format!("{:<24} {}{}", c.display_name, format_relative(c.last_activity, now), unread)
            })
            .collect()
    }
}

/// Call history list
pub struct CallsTab {
    service: Arc<CallHistoryService>,
    records: Vec<CallHistoryRecord>,
    query: Option<String>,
}

impl CallsTab {
    pub fn new(service: Arc<CallHistoryService>) -> Self {
        Self {
            service,
            records: Vec::new(),
            query: None,
        }
    }

    pub fn visible(&self) -> Vec<&CallHistoryRecord> {
        self.records
            .iter()
            .filter(|r| matches_query(&r.conversation_name, &self.query))
            .collect()
    }
}

impl RefreshableTab for CallsTab {
    fn refresh(&mut self) -> Result<()> {
        // A newer load simply replaces whatever is shown
        self.records = self.service.load_history();
        debug!(count = self.records.len(), "Call history refreshed");
        Ok(())
    }

    fn filter(&mut self, query: &str) {
        self.query = normalize_query(query);
    }

    fn set_filter_state(&mut self, state: FilterState) {
        debug!(?state, "Calls tab has no unread/mention filter, ignoring");
    }

    fn visible_len(&self) -> usize {
        self.visible().len()
    }

    fn rows(&self, now: DateTime<Utc>) -> Vec<String> {
        self.visible().into_iter().map(|r| render_row(r, now)).collect()
    }
}

pub enum HomeTab {
    Chats(ConversationsTab),
    Groups(ConversationsTab),
    Calls(CallsTab),
}

impl HomeTab {
    pub fn kind(&self) -> TabKind {
        match self {
            HomeTab::Chats(_) => TabKind::Chats,
            HomeTab::Groups(_) => TabKind::Groups,
            HomeTab::Calls(_) => TabKind::Calls,
        }
    }

    pub fn as_tab(&self) -> &dyn RefreshableTab {
        match self {
            HomeTab::Chats(t) | HomeTab::Groups(t) => t,
            HomeTab::Calls(t) => t,
        }
    }

    pub fn as_tab_mut(&mut self) -> &mut dyn RefreshableTab {
        match self {
            HomeTab::Chats(t) | HomeTab::Groups(t) => t,
            HomeTab::Calls(t) => t,
        }
    }
}

/// Tabbed home screen state
pub struct HomeScreen {
    config: HomeConfig,
    tabs: Vec<HomeTab>,
    current: TabKind,
}

impl HomeScreen {
    pub fn new(config: HomeConfig, service: Arc<CallHistoryService>) -> Self {
        let tabs = vec![
            HomeTab::Chats(ConversationsTab::chats(service.clone())),
            HomeTab::Groups(ConversationsTab::groups(service.clone())),
            HomeTab::Calls(CallsTab::new(service)),
        ];
        let current = config.initial_tab;
        Self { config, tabs, current }
    }

    pub fn current_kind(&self) -> TabKind {
        self.current
    }

    pub fn select(&mut self, kind: TabKind) -> Result<()> {
        self.current = kind;
        self.current_mut().refresh()
    }

    pub fn current(&self) -> &dyn RefreshableTab {
        self.tabs
            .iter()
            .find(|t| t.kind() == self.current)
            .map(HomeTab::as_tab)
            .unwrap_or_else(|| self.tabs[0].as_tab())
    }

    pub fn current_mut(&mut self) -> &mut dyn RefreshableTab {
        let current = self.current;
        let idx = self.tabs.iter().position(|t| t.kind() == current).unwrap_or(0);
        self.tabs[idx].as_tab_mut()
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.current_mut().refresh()
    }

    pub fn search(&mut self, query: &str) {
        let min = self.config.search_min_chars;
        let query = if query.trim().chars().count() < min { "" } else { query };
        self.current_mut().filter(query);
    }

    pub fn set_filter_state(&mut self, state: FilterState) {
        self.current_mut().set_filter_state(state);
    }
}
