use std::{
    fs::{self, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    models::store::{CURRENT_VERSION, Store},
    storage::{
        Storage, StorageError,
        migrations::{apply_migrations, detect_version},
    },
};

/// How many previous versions of the store are kept next to it
const MAX_BACKUPS: usize = 5;

pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Swaps the written temp file in for the store, holding the lock
    fn replace_with(&self, temp_path: &Path) -> Result<(), StorageError> {
        let lock_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StorageError::SaveFailed {
                path: lock_path.clone(),
                source: e,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|e| StorageError::SaveFailed {
                path: lock_path.clone(),
                source: e,
            })?;

        self.backup_current()?;

        fs::rename(temp_path, &self.path).map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;

        lock_file.unlock().map_err(|e| StorageError::SaveFailed {
            path: lock_path,
            source: e,
        })?;

        Ok(())
    }

    fn backup_dir(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or(Path::new("."))
            .join("backups")
    }

    /// Copies the current store file into the backup directory, if there is one
    fn backup_current(&self) -> Result<(), StorageError> {
        if !self.path.exists() {
            return Ok(());
        }

        let dir = self.backup_dir();
        fs::create_dir_all(&dir).map_err(|e| StorageError::BackupFailed {
            path: dir.clone(),
            source: e,
        })?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.json".to_string());
        // zero padded so that backups sort by age
        let stamp = jiff::Timestamp::now().as_nanosecond();
        let backup_path = dir.join(format!("{}.{:020}", file_name, stamp));

        fs::copy(&self.path, &backup_path).map_err(|e| StorageError::BackupFailed {
            path: backup_path.clone(),
            source: e,
        })?;

        self.prune_backups(&dir)
    }

    fn prune_backups(&self, dir: &Path) -> Result<(), StorageError> {
        let read_dir = fs::read_dir(dir).map_err(|e| StorageError::BackupFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut backups: Vec<PathBuf> = read_dir
            .flatten()
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();

        backups.sort();

        let excess = backups.len().saturating_sub(MAX_BACKUPS);
        for old in &backups[..excess] {
            fs::remove_file(old).map_err(|e| StorageError::BackupFailed {
                path: old.clone(),
                source: e,
            })?;
        }

        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Store, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Store::default()),
            Err(e) => {
                return Err(StorageError::LoadFailed {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let mut data: Value =
            serde_json::from_str(&content).map_err(|e| StorageError::ParseFailed {
                path: self.path.clone(),
                source: e,
            })?;

        let file_version = detect_version(&data).ok_or_else(|| StorageError::MissingVersion {
            path: self.path.clone(),
        })?;

        if file_version > CURRENT_VERSION {
            return Err(StorageError::FutureVersion(file_version));
        }

        if file_version < CURRENT_VERSION {
            tracing::info!(
                path = %self.path.display(),
                from = file_version,
                to = CURRENT_VERSION,
                "upgrading store schema"
            );
            data = apply_migrations(data, file_version, CURRENT_VERSION)?;
        }

        if let Some(obj) = data.as_object_mut() {
            obj.insert("version".to_string(), Value::from(CURRENT_VERSION));
        }

        serde_json::from_value(data).map_err(|e| StorageError::ParseFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(store)
            .map_err(|e| StorageError::SerializeFailed { source: e })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::SaveFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = PathBuf::from(format!("{}.tmp.{}", self.path.display(), Uuid::new_v4()));
        fs::write(&temp_path, json).map_err(|e| StorageError::SaveFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        if let Err(e) = self.replace_with(&temp_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        tracing::debug!(path = %self.path.display(), "store saved");
        Ok(())
    }
}
