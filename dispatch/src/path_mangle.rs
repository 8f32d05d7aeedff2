use std::path::Path;

/// Encode a filesystem path into a flat token with no directory separators
/// and no relative indirection: each `/`-separated segment has `..`
/// substituted with `^`, bare `.` segments dropped, everything else kept
/// verbatim, then the segments are joined with `#`.
///
/// Infallible in practice (the only failure mode is allocation failure,
/// which Rust does not model as a recoverable error).
pub fn mangle_path(path: &Path) -> String {
    path.to_string_lossy()
        .split('/')
        .filter_map(|segment| match segment {
            "" | "." => None,
            ".." => Some("^"),
            other => Some(other),
        })
        .collect::<Vec<_>>()
        .join("#")
}
