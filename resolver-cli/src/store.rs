//! Plain JSON credential files, one per platform.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use platforms_resolver::{CredentialStore, Platform, ResolverError};
use tempfile::NamedTempFile;
use tracing::debug;

type StoreResult<T> = platforms_resolver::Result<T>;

pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Opens `<dir>/<platform>.credentials.json`, starting empty when the
    /// file does not exist yet.
    pub fn open(dir: &Path, platform: Platform) -> anyhow::Result<Self> {
        let path = dir.join(format!("{platform}.credentials.json"));
        let values = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> StoreResult<()> {
        let io_error = |e: std::io::Error| {
            ResolverError::Config(format!("writing {}: {e}", self.path.display()))
        };
        if values.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path).map_err(io_error)?;
            }
            return Ok(());
        }
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(io_error)?;
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| ResolverError::Config(e.to_string()))?;

        // Owner-only temp file in the same directory, renamed over the target.
        let mut file = NamedTempFile::new_in(parent).map_err(io_error)?;
        file.write_all(json.as_bytes()).map_err(io_error)?;
        file.as_file().sync_all().map_err(io_error)?;
        file.persist(&self.path).map_err(|e| io_error(e.error))?;
        debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut values = self.values.lock();
        values.clear();
        self.persist(&values)
    }
}
