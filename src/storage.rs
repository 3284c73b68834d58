// Key-value storage backends for persisted state

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CURRENT_VERSION: u32 = 1;

/// Core trait for anything that can hold the store's JSON documents
///
/// Keys are short fixed names ("taskLists", "tasks"); values are whole
/// JSON documents. Each write replaces the previous value for that key.
pub trait KeyValueStorage {
    /// Read the value stored under `key`, or `None` if nothing was ever written
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
}

/// File-backed storage: one `<key>.json` file per key
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Open or create storage at the given path
    ///
    /// Documents are kept in a `.taskly` subdirectory of the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().join(".taskly");

        fs::create_dir_all(&base_path).context("Failed to create storage directory")?;

        let storage = Self { base_path };
        storage.check_version()?;

        Ok(storage)
    }

    /// Get the directory the documents live in
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn check_version(&self) -> Result<()> {
        let version_path = self.base_path.join(".version");
        if !version_path.exists() {
            fs::write(&version_path, CURRENT_VERSION.to_string()).context("Failed to write version file")?;
            return Ok(());
        }

        let content = fs::read_to_string(&version_path).context("Failed to read version file")?;
        match content.trim().parse::<u32>() {
            Ok(CURRENT_VERSION) => {}
            Ok(other) => warn!(
                found = other,
                expected = CURRENT_VERSION,
                "Storage written by a different format version"
            ),
            Err(e) => warn!(error = ?e, "Unreadable storage version file"),
        }

        Ok(())
    }

    /// Keys become file names, so they must stay inside the storage directory
    fn item_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\']) {
            return Err(eyre!("Invalid storage key: {:?}", key));
        }
        Ok(self.base_path.join(format!("{}.json", key)))
    }

    /// Exclusive lock shared by every writer of this directory
    fn lock(&self) -> Result<File> {
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.base_path.join(".lock"))
            .context("Failed to open lock file")?;
        lock_file.lock_exclusive().context("Failed to acquire file lock")?;
        Ok(lock_file)
    }

    /// Write `value` to `tmp_path`, flush it, then move it over `path`
    fn write_document(tmp_path: &Path, path: &Path, value: &str) -> Result<()> {
        let mut file = File::create(tmp_path).context("Failed to create temporary document")?;
        file.write_all(value.as_bytes()).context("Failed to write temporary document")?;
        file.sync_all().context("Failed to flush temporary document")?;
        fs::rename(tmp_path, path).with_context(|| format!("Failed to replace {}", path.display()))
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.item_path(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(content))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.item_path(key)?;
        let tmp_path = path.with_extension("json.tmp");

        // Lock is released when the guard is dropped
        let _guard = self.lock()?;

        let written = Self::write_document(&tmp_path, &path, value);
        if written.is_err() && tmp_path.exists() {
            if let Err(e) = fs::remove_file(&tmp_path) {
                warn!(path = ?tmp_path, error = ?e, "Failed to clean up temporary document");
            }
        }
        written?;

        debug!(key, bytes = value.len(), "Wrote document");
        Ok(())
    }
}

/// In-memory storage, mainly for tests
///
/// `set_fail_writes(true)` makes every write fail, which is how
/// callers exercise persistence-failure handling.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn items(&self) -> &HashMap<String, String> {
        &self.items
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            return Err(eyre!("Simulated write failure for key {}", key));
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
