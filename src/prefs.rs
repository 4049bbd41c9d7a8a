//! Local key-value preferences - persistent JSON storage, one file per region

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// String-keyed persistent storage on a single named region
pub trait PreferenceStore: Send + Sync {
    fn get_string(&self, key: &str) -> Result<Option<String>>;

    fn put_string(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Preferences region persisted as `<dir>/<region>.json`
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    pub fn new(prefs_dir: &Path, region: &str) -> Self {
        Self {
            path: prefs_dir.join(format!("{}.json", region)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Save region to disk atomically
    fn save(&self, data: &BTreeMap<String, String>) -> Result<()> {
        let parent = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        // Write to temp file in same directory (for atomic rename)
        let mut temp = NamedTempFile::new_in(parent)?;
        let json = serde_json::to_string_pretty(data)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.load()?;
        data.insert(key.to_string(), value.to_string());
        self.save(&data)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut data = self.load()?;
        if data.remove(key).is_some() {
            self.save(&data)?;
        }
        Ok(())
    }
}

/// In-process preferences, lost on drop
#[derive(Default)]
pub struct MemoryPreferences {
    data: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still a valid map
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_prefs_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let prefs = FilePreferences::new(temp_dir.path(), "region");
        assert_eq!(prefs.get_string("anything").unwrap(), None);
    }

    #[test]
    fn test_file_prefs_put_get_remove() {
        let temp_dir = TempDir::new().unwrap();
        let prefs = FilePreferences::new(&temp_dir.path().join("nested"), "region");

        prefs.put_string("a", "1").unwrap();
        prefs.put_string("b", "2").unwrap();
        assert!(prefs.path().exists());

        // A fresh handle sees persisted values
        let reopened = FilePreferences::new(&temp_dir.path().join("nested"), "region");
        assert_eq!(reopened.get_string("a").unwrap(), Some("1".to_string()));

        reopened.remove("a").unwrap();
        assert_eq!(prefs.get_string("a").unwrap(), None);
        assert_eq!(prefs.get_string("b").unwrap(), Some("2".to_string()));

        // Removing an absent key is fine
        prefs.remove("zzz").unwrap();
    }

    #[test]
    fn test_file_prefs_corrupt_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let prefs = FilePreferences::new(temp_dir.path(), "region");
        fs::write(prefs.path(), "not json").unwrap();
        assert!(matches!(prefs.get_string("a"), Err(Error::Json(_))));
    }

    #[test]
    fn test_memory_prefs() {
        let prefs = MemoryPreferences::new();
        prefs.put_string("k", "v").unwrap();
        assert_eq!(prefs.get_string("k").unwrap(), Some("v".to_string()));
        prefs.remove("k").unwrap();
        assert_eq!(prefs.get_string("k").unwrap(), None);
    }
}
