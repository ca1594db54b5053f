use std::io::{self, Write};
use std::panic::Location;
use std::path::{Path, PathBuf};

/// A file that lives exactly as long as one fetch.
///
/// The file is removed when the guard is dropped, on every exit path.
/// Removal failures are logged and otherwise ignored so they never replace
/// the fetch's own result.
#[derive(Debug)]
pub(crate) struct ScopedFile {
    path: PathBuf,
    reason: &'static str,
}

impl ScopedFile {
    /// Creates a uniquely named file in `dir` holding `contents`.
    pub(crate) fn create(
        dir: &Path,
        prefix: &str,
        suffix: &str,
        contents: &[u8],
        reason: &'static str,
    ) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(dir)?;
        let (mut file, path) = file.keep().map_err(|err| err.error)?;
        // Owned from here on, so a failed write still removes the file.
        let guard = Self { path, reason };
        file.write_all(contents)?;
        file.sync_all()?;
        Ok(guard)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        remove_file_best_effort(&self.path, self.reason);
    }
}

#[track_caller]
pub(crate) fn remove_file_best_effort(path: &Path, reason: &'static str) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            let loc = Location::caller();
            tracing::debug!(
                target = "nbgradle.fetch",
                path = %path.display(),
                reason,
                file = loc.file(),
                line = loc.line(),
                error = %err,
                "failed to remove temp file (best effort)"
            );
        }
    }
}
