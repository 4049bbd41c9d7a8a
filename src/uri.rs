//! Recognise links that point back into the user's own server

use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static FILE_SHARE_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.*/f/\d*$").unwrap());
static TALK_CALL_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.*/call/[a-zA-Z0-9]+$").unwrap());
static FILE_ID_QUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.*fileid=\d*$").unwrap());

pub fn has_http_protocol_prefix(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

fn starts_with_app_path(base_url: &str, url: &str, path: &str) -> bool {
    url.starts_with(&format!("{}/{}", base_url, path)) || url.starts_with(&format!("{}/index.php/{}", base_url, path))
}

fn last_path_segment(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    Ok(parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default()
        .to_string())
}

/// `<base>/f/41` or `<base>/index.php/f/41`
pub fn is_internal_file_share_url(base_url: &str, url: &str) -> bool {
    starts_with_app_path(base_url, url, "f/") && FILE_SHARE_PATH.is_match(url)
}

pub fn extract_file_share_id(url: &str) -> Result<String> {
    last_path_segment(url)
}

/// `<base>/call/<token>` with an alphanumeric token
pub fn is_internal_talk_url(base_url: &str, url: &str) -> bool {
    starts_with_app_path(base_url, url, "call/") && TALK_CALL_PATH.is_match(url)
}

pub fn extract_room_token(url: &str) -> Result<String> {
    last_path_segment(url)
}

/// `<base>/apps/files/?dir=/Engineering&fileid=41`
pub fn is_internal_file_url(base_url: &str, url: &str) -> bool {
    if !starts_with_app_path(base_url, url, "apps/files/") {
        return false;
    }
    let has_file_id = Url::parse(url)
        .map(|u| u.query_pairs().any(|(k, _)| k == "fileid"))
        .unwrap_or(false);
    has_file_id && FILE_ID_QUERY.is_match(url)
}

/// Value of the `fileid` query parameter, empty when absent
pub fn extract_file_id(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    Ok(parsed
        .query_pairs()
        .find(|(k, _)| k == "fileid")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default())
}

/// `<base>/apps/files/files/41?dir=/`
pub fn is_internal_file_url_new(base_url: &str, url: &str) -> bool {
    starts_with_app_path(base_url, url, "apps/files/files/")
}

pub fn extract_file_id_new(url: &str) -> Result<String> {
    last_path_segment(url)
}

/// What a link points to, for the CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    TalkRoom(String),
    FileShare(String),
    File(String),
    External,
}

pub fn classify_link(base_url: &str, url: &str) -> Result<LinkTarget> {
    let base_url = base_url.trim_end_matches('/');
    if !has_http_protocol_prefix(url) {
        return Ok(LinkTarget::External);
    }
    if is_internal_talk_url(base_url, url) {
        return Ok(LinkTarget::TalkRoom(extract_room_token(url)?));
    }
    if is_internal_file_share_url(base_url, url) {
        return Ok(LinkTarget::FileShare(extract_file_share_id(url)?));
    }
    if is_internal_file_url_new(base_url, url) {
        return Ok(LinkTarget::File(extract_file_id_new(url)?));
    }
    if is_internal_file_url(base_url, url) {
        return Ok(LinkTarget::File(extract_file_id(url)?));
    }
    Ok(LinkTarget::External)
}
