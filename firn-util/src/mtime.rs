//! Filesystem modification-time queries, with a sentinel for "missing".

use std::{path::Path, time::UNIX_EPOCH};

/// The effective mtime of a path that does not exist, or whose metadata
/// could not be read.
///
/// A missing dependency therefore compares older than any consumer that does
/// exist, and a missing consumer compares older than any dependency that
/// does exist — both directions fall naturally out of treating `-1` as
/// "before the epoch".
pub const MISSING_MTIME: i64 = -1;

/// Modification time of `path`, in whole seconds since the Unix epoch, or
/// [`MISSING_MTIME`] if the path does not exist or its mtime cannot be read.
///
/// This never fails; staleness decisions must not abort a build merely
/// because a `stat` raced with a concurrent delete or the path was never
/// there to begin with.
pub fn mtime(path: &Path) -> i64
{
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(MISSING_MTIME)
}
