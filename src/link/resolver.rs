//! Destination filename resolution for the receiver.

use std::path::{Path, PathBuf};

/// Name used when the decoded filename has no usable base name.
pub const FALLBACK_NAME: &str = "received.bin";

/// Reduce a decoded filename to a plain base name inside the output directory.
///
/// The sender only ever transmits a base name, but the decoded bytes are not
/// trusted: any directory part is dropped, and names like `..` fall back to
/// [`FALLBACK_NAME`].
pub fn sanitize(decoded: &str) -> String {
    let trimmed = decoded.trim_matches(char::from(0)).trim();
    let base = trimmed.rsplit(['/', '\\']).next().unwrap_or_default();
    match base {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        name => name.to_string(),
    }
}

/// Return a path in `dir` that does not exist at call time.
///
/// Tries `name`, then `name (1)`, `name (2)`, ... The check-then-create gap is
/// not guarded against other processes writing into `dir`.
pub fn resolve_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !exists(&candidate) {
        return candidate;
    }

    let mut n: u64 = 1;
    loop {
        let candidate = dir.join(format!("{} ({})", name, n));
        if !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

// Dangling symlinks count as taken.
fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}
