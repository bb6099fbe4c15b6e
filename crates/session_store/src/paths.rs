use std::path::{Path, PathBuf};

pub const STATE_DIR: [&str; 2] = [".job-relay", "state"];

/// Fixed key the session snapshot is stored under.
pub const SNAPSHOT_FILE_NAME: &str = "chat-session.json";

#[must_use]
pub fn state_root(cwd: &Path) -> PathBuf {
    cwd.join(STATE_DIR[0]).join(STATE_DIR[1])
}

#[must_use]
pub fn snapshot_path(root: &Path) -> PathBuf {
    root.join(SNAPSHOT_FILE_NAME)
}

/// Sibling temp file used for atomic replacement of the snapshot.
#[must_use]
pub fn temp_file_name() -> String {
    format!(".{SNAPSHOT_FILE_NAME}.{}.tmp", uuid::Uuid::new_v4().simple())
}
