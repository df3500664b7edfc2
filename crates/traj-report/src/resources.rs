use std::env;
use std::path::{Path, PathBuf};

use crate::error::{ReportError, ReportResult};

/// Environment variable overriding where packaged reference files live.
pub const DATA_DIR_VAR: &str = "TRAJ_REPORT_DATA_DIR";

/// Full path to one of the packaged reference files. Resolves under
/// `TRAJ_REPORT_DATA_DIR` when set, otherwise under the crate's `data/`
/// directory. A resolved path that does not exist on disk is an error, not a
/// silent fallback.
pub fn data_filename(relative_path: &str) -> ReportResult<PathBuf> {
    let base = match env::var_os(DATA_DIR_VAR) {
        Some(dir) => PathBuf::from(dir),
        None => Path::new(env!("CARGO_MANIFEST_DIR")).join("data"),
    };
    let path = base.join(relative_path);
    if !path.exists() {
        return Err(ReportError::MissingResource(path));
    }
    Ok(path)
}
