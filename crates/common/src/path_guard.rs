//! Lexical path resolution for item names.
//!
//! Every store operation that accepts a caller-supplied name routes it through
//! [`resolve`] before touching the filesystem. Resolution is purely lexical:
//! `.` segments are dropped, `..` pops the previous segment, and anything that
//! would land on or above the base directory is rejected. Symlinks are not
//! followed; the feed directory only ever contains files we wrote ourselves.

use std::path::{Component, Path, PathBuf};

/// A name that resolves outside (or onto) the base directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("path escapes feed directory: {0}")]
pub struct PathTraversal(pub String);

/// Join `name` under `base`, rejecting anything that is not a strict descendant.
pub fn resolve(base: &Path, name: &str) -> Result<PathBuf, PathTraversal> {
    let mut segments: Vec<&std::ffi::OsStr> = Vec::new();

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => segments.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if segments.pop().is_none() {
                    return Err(PathTraversal(name.to_string()));
                }
            }
            // absolute names would replace `base` entirely on join
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathTraversal(name.to_string()));
            }
        }
    }

    if segments.is_empty() {
        return Err(PathTraversal(name.to_string()));
    }

    Ok(segments
        .into_iter()
        .fold(base.to_path_buf(), |path, part| path.join(part)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PathBuf {
        PathBuf::from("/data/demo")
    }

    #[test]
    fn test_plain_name() {
        assert_eq!(
            resolve(&base(), "Pasted Text.txt").unwrap(),
            PathBuf::from("/data/demo/Pasted Text.txt")
        );
    }

    #[test]
    fn test_dot_segments_are_normalized() {
        assert_eq!(
            resolve(&base(), "./a/../b.png").unwrap(),
            PathBuf::from("/data/demo/b.png")
        );
    }

    #[test]
    fn test_parent_escape_rejected() {
        assert!(resolve(&base(), "../otherFeed/config.json").is_err());
        assert!(resolve(&base(), "a/../../otherFeed").is_err());
        assert!(resolve(&base(), "..").is_err());
    }

    #[test]
    fn test_base_itself_rejected() {
        assert!(resolve(&base(), "").is_err());
        assert!(resolve(&base(), ".").is_err());
        assert!(resolve(&base(), "a/..").is_err());
    }

    #[test]
    fn test_absolute_rejected() {
        let err = resolve(&base(), "/etc/passwd").unwrap_err();
        assert_eq!(err, PathTraversal("/etc/passwd".to_string()));
    }
}
