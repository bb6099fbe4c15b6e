mod error;
mod paths;
mod schema;
mod store;

pub use error::SnapshotStoreError;
pub use paths::{snapshot_path, state_root, temp_file_name, SNAPSHOT_FILE_NAME};
pub use schema::{SessionSnapshot, SNAPSHOT_VERSION};
pub use store::{now_rfc3339, SnapshotStore};
