//! File formats: the target list read at the start of a night and the
//! per-night status snapshot written after every completion.

pub mod snapshot;
pub mod target_file;

pub use snapshot::{read_snapshot, snapshot_file_name, SnapshotRow, SnapshotWriter};
pub use target_file::{parse_target_file, parse_target_str, TargetRecord};
