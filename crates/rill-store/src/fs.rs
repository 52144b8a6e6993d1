use std::fs::{self, File, OpenOptions};
use std::path::Path;

use rill_events::{PipelineError, PipelineResult};

/// Directory that holds `path`, defaulting to the working directory.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Open `path` for reading and appending, creating it and its parent
/// directories when missing.
pub(crate) fn open_or_create(path: &Path) -> PipelineResult<File> {
    fs::create_dir_all(parent_dir(path)).map_err(|e| PipelineError::persistence(path, e))?;
    OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| PipelineError::persistence(path, e))
}
