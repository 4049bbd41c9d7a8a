//! Talk call history
//!
//! Rebuilds a call history list from a chat client's locally stored call
//! lifecycle messages and guesses whether each call was audio or video, backed
//! by a small journal of calls known to have been started with video.

pub mod models;
pub mod store;
pub mod prefs;
pub mod journal;
pub mod classifier;
pub mod history;
pub mod display;
pub mod service;
pub mod tabs;
pub mod uri;
pub mod config;
pub mod error;

pub use error::{Error, Result};
