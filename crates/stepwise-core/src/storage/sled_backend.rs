//! Sled directory stores.
//!
//! A store is a directory holding a sled database. Its schema metadata lives in
//! the `store:meta` tree; every other tree holds records.
//!
//! sled rewrites its files whenever a database is opened, so existing stores
//! are only read through a [`StoreSnapshot`]: a temporary copy of the store
//! directory. The original is never opened in place during a migration.

use super::{ReplaceError, SledStoreConfig, StoreBackend, StoreLocation, StoreMetadata, StoreType};
use crate::catalog::SchemaVersion;
use crate::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Tree name for store metadata.
pub(crate) const META_TREE: &[u8] = b"store:meta";

/// Key of the schema metadata record in the meta tree.
const SCHEMA_KEY: &[u8] = b"schema";

/// Suffix of the directory the original is moved to during a swap.
const BACKUP_SUFFIX: &str = "stepwise-backup";

/// Suffix of temporary snapshot directories.
const SNAPSHOT_SUFFIX: &str = ".snapshot";

/// Files every sled database directory holds.
const SLED_FILES: [&str; 2] = ["conf", "db"];

/// Read-only view of an existing store, backed by a temporary copy.
///
/// The copy lives next to the store (or under the configured scratch
/// directory) and is removed on drop.
pub(crate) struct StoreSnapshot {
    // Dropped before the directory.
    db: sled::Db,
    _dir: tempfile::TempDir,
}

impl StoreSnapshot {
    /// Copy the store at `location` and open the copy.
    pub(crate) fn open(config: &SledStoreConfig, location: &StoreLocation) -> Result<Self, Error> {
        ensure_store(location.path())?;

        let dir = snapshot_dir(config, location.path())?;
        let path = dir.path().join("store");
        copy_dir(location.path(), &path)?;
        let db = config.to_sled_config(&path).open()?;

        debug!(store = %location, snapshot = %path.display(), "store snapshot opened");
        Ok(Self { db, _dir: dir })
    }

    /// The snapshot database.
    pub(crate) fn db(&self) -> &sled::Db {
        &self.db
    }
}

/// [`StoreBackend`] for sled directory stores.
#[derive(Debug, Clone)]
pub struct SledBackend {
    config: SledStoreConfig,
    store_type: StoreType,
}

impl SledBackend {
    /// Create a backend with the given configuration.
    pub fn new(config: SledStoreConfig) -> Self {
        Self {
            config,
            store_type: StoreType::sled(),
        }
    }

    /// Backend configuration.
    pub fn config(&self) -> &SledStoreConfig {
        &self.config
    }

    /// Create (or open) a store and stamp it with `schema`.
    ///
    /// The returned handle can be used to populate the store; it must be
    /// dropped before the store is migrated.
    pub fn initialize(
        &self,
        location: &StoreLocation,
        schema: &SchemaVersion,
    ) -> Result<sled::Db, Error> {
        let db = self.config.to_sled_config(location.path()).open()?;
        Self::stamp(&db, schema)?;
        db.flush()?;
        Ok(db)
    }

    /// Open an existing store in place, for writing.
    ///
    /// Opening rewrites sled's files; use [`StoreBackend::read_metadata`] or
    /// [`SledBackend::content_digest`] to inspect a store without changing it.
    pub fn open_store(&self, location: &StoreLocation) -> Result<sled::Db, Error> {
        ensure_store(location.path())?;
        Ok(self.config.to_sled_config(location.path()).open()?)
    }

    /// Write schema metadata into an open store.
    pub fn stamp(db: &sled::Db, schema: &SchemaVersion) -> Result<(), Error> {
        let meta = db.open_tree(META_TREE)?;
        meta.insert(SCHEMA_KEY, StoreMetadata::for_schema(schema).to_bytes()?)?;
        Ok(())
    }

    /// blake3 digest over every tree and record of a store, in key order.
    pub fn content_digest(&self, location: &StoreLocation) -> Result<String, Error> {
        let snapshot = StoreSnapshot::open(&self.config, location)?;
        let db = snapshot.db();
        let mut names = db.tree_names();
        names.sort();

        let mut hasher = blake3::Hasher::new();
        for name in names {
            let tree = db.open_tree(&name)?;
            hasher.update(&(name.len() as u64).to_be_bytes());
            hasher.update(&name);
            for item in tree.iter() {
                let (key, value) = item?;
                hasher.update(&(key.len() as u64).to_be_bytes());
                hasher.update(&key);
                hasher.update(&(value.len() as u64).to_be_bytes());
                hasher.update(&value);
            }
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    fn scratch_path(&self, original: &StoreLocation, tag: &str) -> PathBuf {
        let name = store_name(original.path());
        let dir = match &self.config.scratch_dir {
            Some(dir) => dir.clone(),
            None => parent_dir(original.path()),
        };
        dir.join(format!("{name}.{tag}.scratch"))
    }

    fn backup_path(original: &StoreLocation) -> PathBuf {
        let name = store_name(original.path());
        parent_dir(original.path()).join(format!("{name}.{BACKUP_SUFFIX}"))
    }
}

impl Default for SledBackend {
    fn default() -> Self {
        Self::new(SledStoreConfig::default())
    }
}

impl StoreBackend for SledBackend {
    fn store_type(&self) -> &StoreType {
        &self.store_type
    }

    fn read_metadata(&self, location: &StoreLocation) -> Result<StoreMetadata, Error> {
        let snapshot = StoreSnapshot::open(&self.config, location)?;
        let meta = snapshot.db().open_tree(META_TREE)?;
        match meta.get(SCHEMA_KEY)? {
            Some(bytes) => StoreMetadata::from_bytes(&bytes),
            None => Err(Error::MissingMetadata(location.path().to_path_buf())),
        }
    }

    fn create_scratch(
        &self,
        original: &StoreLocation,
        tag: &str,
        schema: &SchemaVersion,
    ) -> Result<StoreLocation, Error> {
        let path = self.scratch_path(original, tag);
        if path.exists() {
            warn!(path = %path.display(), "removing stale scratch store");
            fs::remove_dir_all(&path)?;
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let location = StoreLocation::new(path);
        let db = self.initialize(&location, schema)?;
        drop(db);

        debug!(scratch = %location, schema = %schema.id(), "scratch store created");
        Ok(location)
    }

    fn discard(&self, location: &StoreLocation) -> Result<(), Error> {
        if location.path().exists() {
            fs::remove_dir_all(location.path())?;
            debug!(scratch = %location, "scratch store discarded");
        }
        Ok(())
    }

    fn replace(
        &self,
        original: &StoreLocation,
        replacement: &StoreLocation,
    ) -> Result<(), ReplaceError> {
        if !replacement.path().exists() {
            return Err(ReplaceError::untouched(Error::StoreNotFound(
                replacement.path().to_path_buf(),
            )));
        }

        // A leftover backup may be the only copy of an earlier original.
        let backup = Self::backup_path(original);
        if backup.exists() {
            return Err(ReplaceError::untouched(Error::BackupExists(backup)));
        }

        // A crash between these two renames leaves the original under the
        // backup name; it is never deleted before the new store is in place.
        fs::rename(original.path(), &backup).map_err(ReplaceError::untouched)?;
        if let Err(e) = fs::rename(replacement.path(), original.path()) {
            let original_restored = match fs::rename(&backup, original.path()) {
                Ok(()) => true,
                Err(restore) => {
                    error!(
                        original = %original,
                        backup = %backup.display(),
                        error = %restore,
                        "failed to restore original store"
                    );
                    false
                }
            };
            return Err(ReplaceError {
                cause: e.into(),
                original_restored,
            });
        }

        if let Err(e) = fs::remove_dir_all(&backup) {
            warn!(path = %backup.display(), error = %e, "failed to remove backup store");
        }
        Ok(())
    }
}

fn store_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string())
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Fail unless `path` holds a sled database.
fn ensure_store(path: &Path) -> Result<(), Error> {
    if !path.exists() {
        return Err(Error::StoreNotFound(path.to_path_buf()));
    }
    if !SLED_FILES.iter().all(|file| path.join(file).is_file()) {
        return Err(Error::NotAStore(path.to_path_buf()));
    }
    Ok(())
}

fn snapshot_dir(config: &SledStoreConfig, original: &Path) -> Result<tempfile::TempDir, Error> {
    let parent = match &config.scratch_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            dir.clone()
        }
        None => parent_dir(original),
    };
    let parent = if parent.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        parent
    };

    let prefix = format!("{}.", store_name(original));
    let dir = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(SNAPSHOT_SUFFIX)
        .tempdir_in(parent)?;
    Ok(dir)
}

fn copy_dir(from: &Path, to: &Path) -> Result<(), Error> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
