//! Best-effort removal of intermediate and partial output files.

use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const DELETE_ATTEMPTS: u32 = 5;
const DELETE_RETRY_DELAY: Duration = Duration::from_millis(200);

fn delete_with_retries(path: &Path) -> io::Result<()> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match std::fs::remove_file(path) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(_) if attempts < DELETE_ATTEMPTS => thread::sleep(DELETE_RETRY_DELAY),
            Err(e) => return Err(e),
        }
    }
}

/// Delete each path, retrying transient failures. Missing files count as
/// deleted. Returns the paths that could not be removed.
pub fn delete_files<I, P>(paths: I) -> Vec<(PathBuf, io::Error)>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    paths
        .into_iter()
        .filter_map(|p| {
            let path = p.as_ref();
            delete_with_retries(path)
                .err()
                .map(|e| (path.to_path_buf(), e))
        })
        .collect()
}

/// [`delete_files`] with every failure logged as a warning.
pub fn clean_files<I, P>(paths: I)
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    for (path, err) in delete_files(paths) {
        log::warn!(
            target: "dash_encode::files",
            "Failed to delete {}: {}",
            path.display(),
            err
        );
    }
}
