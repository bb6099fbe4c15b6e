use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::SnapshotStoreError;
use crate::paths::{snapshot_path, temp_file_name};
use crate::schema::{SessionSnapshot, SNAPSHOT_VERSION};

/// Durable key-value slot holding the latest session snapshot.
///
/// Saves replace the whole document atomically: the new snapshot is written to
/// a sibling temp file, synced, then renamed over the previous one.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        snapshot_path(&self.root)
    }

    /// Loads the stored snapshot, or `None` when nothing was saved yet.
    pub fn load(&self) -> Result<Option<SessionSnapshot>, SnapshotStoreError> {
        let path = self.path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SnapshotStoreError::io("reading snapshot", &path, source));
            }
        };

        let snapshot = serde_json::from_str::<SessionSnapshot>(&raw)
            .map_err(|source| SnapshotStoreError::json_parse(&path, source))?;
        validate_snapshot(&path, &snapshot)?;

        Ok(Some(snapshot))
    }

    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotStoreError> {
        let path = self.path();
        validate_snapshot(&path, snapshot)?;

        fs::create_dir_all(&self.root)
            .map_err(|source| SnapshotStoreError::io("creating state dir", &self.root, source))?;

        let encoded = serde_json::to_vec_pretty(snapshot)
            .map_err(|source| SnapshotStoreError::json_serialize(&path, source))?;

        let temp_path = self.root.join(temp_file_name());
        if let Err(error) = write_synced(&temp_path, &encoded) {
            let _ = fs::remove_file(&temp_path);
            return Err(error);
        }

        fs::rename(&temp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            SnapshotStoreError::io("replacing snapshot", &path, source)
        })
    }

    /// Removes the stored snapshot. Missing files are not an error.
    pub fn clear(&self) -> Result<(), SnapshotStoreError> {
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SnapshotStoreError::io("removing snapshot", &path, source)),
        }
    }
}

/// Current UTC time formatted for `saved_at`.
pub fn now_rfc3339() -> Result<String, SnapshotStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(SnapshotStoreError::ClockFormat)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), SnapshotStoreError> {
    let mut file = File::create(path)
        .map_err(|source| SnapshotStoreError::io("creating temp snapshot", path, source))?;
    file.write_all(bytes)
        .map_err(|source| SnapshotStoreError::io("writing temp snapshot", path, source))?;
    file.sync_all()
        .map_err(|source| SnapshotStoreError::io("syncing temp snapshot", path, source))
}

pub(crate) fn validate_snapshot(
    path: &Path,
    snapshot: &SessionSnapshot,
) -> Result<(), SnapshotStoreError> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotStoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: snapshot.version,
        });
    }

    if OffsetDateTime::parse(&snapshot.saved_at, &Rfc3339).is_err() {
        return Err(SnapshotStoreError::InvalidTimestamp {
            path: path.to_path_buf(),
            field: "saved_at",
            value: snapshot.saved_at.clone(),
        });
    }

    if let Some(current) = &snapshot.current_conversation_id {
        if !snapshot
            .conversations
            .iter()
            .any(|conversation| &conversation.id == current)
        {
            return Err(SnapshotStoreError::UnknownCurrentConversation {
                path: path.to_path_buf(),
                id: current.to_string(),
            });
        }
    }

    Ok(())
}
