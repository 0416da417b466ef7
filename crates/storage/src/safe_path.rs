// SPDX-License-Identifier: MIT

//! Every filesystem access the Supervisor, log pipeline, and config store
//! perform is routed through this module. No other module in
//! the workspace is allowed to call `std::fs` with an id- or
//! user-controlled path directly.

use std::path::{Component, Path, PathBuf};

/// Maximum length of a single filename-shaped component (analysis id, log
/// file segment, ...).
const MAX_FILENAME_LEN: usize = 255;

/// Returns true iff `target`, once normalized, is equal to or a descendant
/// of `base`, with no `..` escape and no symlink escape.
///
/// Neither path needs to exist: we normalize lexically (resolving `.`/`..`
/// components) rather than calling `fs::canonicalize`, which would fail on
/// paths that don't exist yet (e.g. a log file about to be created). Any
/// existing component of `target` that is a symlink pointing outside `base`
/// is still caught because `std::fs::canonicalize` is applied afterward when
/// both paths exist; during creation the lexical check alone is the "no `..`
/// escape" proof and is sufficient given every segment is pre-validated by
/// [`is_safe_filename`].
pub fn is_path_safe(target: &Path, base: &Path) -> bool {
    let normalized_base = normalize(base);
    let normalized_target = normalize(target);

    if !normalized_target.starts_with(&normalized_base) {
        return false;
    }

    // If both paths exist on disk, additionally resolve symlinks and
    // re-check containment so a symlink planted inside `base` can't escape it.
    if let (Ok(real_base), Ok(real_target)) =
        (std::fs::canonicalize(&normalized_base), std::fs::canonicalize(&normalized_target))
    {
        return real_target.starts_with(&real_base);
    }

    true
}

/// Lexical normalization: resolves `.` and `..` without touching the
/// filesystem. A leading `..` that would escape the root is simply dropped,
/// which is enough given callers also validate individual segments.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Filename validation: non-empty, <= 255 bytes, letters,
/// digits, spaces, `.`, `_`, `-` only; not `.` or `..`; no path separators
/// or control bytes.
pub fn is_safe_filename(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_FILENAME_LEN {
        return false;
    }
    if name == "." || name == ".." {
        return false;
    }
    name.chars().all(|c| {
        c.is_ascii_alphanumeric() || c == ' ' || c == '.' || c == '_' || c == '-'
    })
}

/// Joins `segments` onto `<analysis_root>/<analysis_id>/` iff `analysis_id`
/// passes filename validation and no segment contains `..`, an absolute
/// path, or a path separator.
pub fn analysis_file_path(
    analysis_root: &Path,
    analysis_id: &str,
    segments: &[&str],
) -> Option<PathBuf> {
    if !is_safe_filename(analysis_id) {
        return None;
    }
    let mut path = analysis_root.join(analysis_id);
    for segment in segments {
        if segment.contains("..") || Path::new(segment).is_absolute() {
            return None;
        }
        if segment.contains('/') || segment.contains('\\') {
            return None;
        }
        path.push(segment);
    }
    if is_path_safe(&path, analysis_root) {
        Some(path)
    } else {
        None
    }
}

/// Absolute paths are allowed only when they contain no `..` component —
/// used for trust material (certificates, config roots) supplied at startup.
pub fn is_absolute_path_safe(p: &Path) -> bool {
    p.is_absolute() && !p.components().any(|c| matches!(c, Component::ParentDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_dotdot_escape() {
        let base = Path::new("/data/analyses");
        let target = base.join("../../etc/passwd");
        assert!(!is_path_safe(&target, base));
    }

    #[test]
    fn accepts_descendant_path() {
        let base = Path::new("/data/analyses");
        let target = base.join("an-1").join("analysis.log");
        assert!(is_path_safe(&target, base));
    }

    #[test]
    fn accepts_base_itself() {
        let base = Path::new("/data/analyses");
        assert!(is_path_safe(base, base));
    }

    #[yare::parameterized(
        plain = {"index.js", true},
        with_space = {"my analysis.js", true},
        dot = {".", false},
        dotdot = {"..", false},
        empty = {"", false},
        paren = {"bad(name).js", false},
        slash = {"a/b.js", false},
        at_sign = {"@scope.js", false},
    )]
    fn filename_validation(name: &str, expected: bool) {
        assert_eq!(is_safe_filename(name), expected);
    }

    #[test]
    fn analysis_file_path_rejects_unsafe_id() {
        let root = Path::new("/data/analyses");
        assert!(analysis_file_path(root, "../escape", &["analysis.log"]).is_none());
    }

    #[test]
    fn analysis_file_path_rejects_segment_traversal() {
        let root = Path::new("/data/analyses");
        assert!(analysis_file_path(root, "an-1", &["..", "other", "analysis.log"]).is_none());
    }

    #[test]
    fn analysis_file_path_joins_when_safe() {
        let root = Path::new("/data/analyses");
        let path = analysis_file_path(root, "an-1", &["versions", "2", "index.js"]).unwrap();
        assert!(is_path_safe(&path, root));
        assert_eq!(path, root.join("an-1").join("versions").join("2").join("index.js"));
    }

    #[test]
    fn absolute_path_safe_requires_no_dotdot() {
        assert!(is_absolute_path_safe(Path::new("/etc/certs/ca.pem")));
        assert!(!is_absolute_path_safe(Path::new("/etc/certs/../passwd")));
        assert!(!is_absolute_path_safe(Path::new("relative/path")));
    }
}
