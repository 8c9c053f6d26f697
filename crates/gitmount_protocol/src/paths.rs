//! Path escaping shared by the filesystem layer and its clients.
//!
//! The repository stores its own bookkeeping (`@gitmount`, `.git`) next to
//! user files, so user-visible names that begin with `@`, `.` or `_` are
//! stored with an extra leading `@`. `.` and `..` are never rewritten.

use std::path::{Component, Path, PathBuf};

const ESCAPE: char = '@';
const NEEDS_ESCAPE: [char; 3] = ['@', '.', '_'];

/// Maps a user-visible path to its on-disk name.
pub fn escape_path(path: &Path) -> PathBuf {
    map_components(path, |name| {
        if name.starts_with(&NEEDS_ESCAPE[..]) {
            format!("{ESCAPE}{name}")
        } else {
            name.to_string()
        }
    })
}

/// Maps an on-disk path back to the user-visible name.
pub fn unescape_path(path: &Path) -> PathBuf {
    map_components(path, |name| {
        name.strip_prefix(ESCAPE).unwrap_or(name).to_string()
    })
}

/// Returns true if every component is a name [`escape_path`] could produce.
///
/// Components starting with `.` are internal, as are components starting
/// with `@` that are not followed by one of `@`, `.` or `_`.
pub fn is_valid_path(path: &Path) -> bool {
    path.components().all(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                return false;
            }
            match name.strip_prefix(ESCAPE) {
                Some(rest) => rest.starts_with(&NEEDS_ESCAPE[..]),
                None => true,
            }
        }
        _ => true,
    })
}

fn map_components(path: &Path, f: impl Fn(&str) -> String) -> PathBuf {
    path.components()
        .map(|c| match c {
            Component::Normal(name) => PathBuf::from(f(&name.to_string_lossy())),
            other => PathBuf::from(other.as_os_str()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_special_leading_characters() {
        assert_eq!(escape_path(Path::new("/a/.git/b")), PathBuf::from("/a/@.git/b"));
        assert_eq!(escape_path(Path::new("_build")), PathBuf::from("@_build"));
        assert_eq!(escape_path(Path::new("@home")), PathBuf::from("@@home"));
        assert_eq!(escape_path(Path::new("plain/file.txt")), PathBuf::from("plain/file.txt"));
    }

    #[test]
    fn leaves_root_and_dot_components() {
        assert_eq!(escape_path(Path::new("/")), PathBuf::from("/"));
        assert_eq!(escape_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn unescape_inverts_escape() {
        for p in ["/a/.hidden", "_x/@y/z", "/@@/.../_"] {
            let p = Path::new(p);
            assert_eq!(unescape_path(&escape_path(p)), p);
        }
    }

    #[test]
    fn validity() {
        assert!(is_valid_path(Path::new("/")));
        assert!(is_valid_path(Path::new("/a/@.git")));
        assert!(is_valid_path(Path::new("@_x/y")));
        assert!(!is_valid_path(Path::new("/a/.git")));
        assert!(!is_valid_path(Path::new("@gitmount/control")));
        assert!(!is_valid_path(Path::new("@")));
    }

    #[test]
    fn escaped_paths_are_valid() {
        for p in ["/.a/_b/@c/d", "x/.y"] {
            assert!(is_valid_path(&escape_path(Path::new(p))));
        }
    }
}
