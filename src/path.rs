//! Path normalisation for paths found under a CVS root.
//!
//! Every `,v` file on disk has a CVS-root-relative on-disk path; the path
//! recorded against a changeset (and ultimately emitted to the target VCS)
//! strips the `,v` suffix and elides a trailing `Attic` directory, since CVS
//! moves a file there when it is removed from the working tree without that
//! affecting where the file logically lives.

use std::{
    ffi::OsStr,
    os::unix::prelude::OsStrExt,
    path::{Path, PathBuf},
};

/// Strips CVSROOT-specific components of the file path: specifically,
/// removing the `,v` suffix if present and stripping the `Attic` directory
/// if it's the last directory in the path. Returns a newly allocated path.
pub(crate) fn munge_raw_path(input: &Path, prefix: &Path) -> PathBuf {
    let unprefixed = input.strip_prefix(prefix).unwrap_or(input);

    if let Some(input_file) = unprefixed.file_name() {
        let file = strip_comma_v_suffix(input_file).unwrap_or_else(|| PathBuf::from(input_file));
        strip_attic_suffix(unprefixed)
            .map(|path| path.join(file))
            .unwrap_or_else(|| input_file.into())
    } else {
        unprefixed.into()
    }
}

fn strip_attic_suffix(path: &Path) -> Option<&Path> {
    path.parent().and_then(|parent| {
        if parent.ends_with(OsStr::from_bytes(b"Attic")) {
            parent.parent()
        } else {
            Some(parent)
        }
    })
}

fn strip_comma_v_suffix(file: &OsStr) -> Option<PathBuf> {
    // We use OsStr here because it has methods we need: Path doesn't allow
    // for easy slicing within path components, and doesn't consider comma a
    // file extension separator.
    file.as_bytes()
        .strip_suffix(b",v")
        .map(|stripped| PathBuf::from(OsStr::from_bytes(stripped)))
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_munge {
        ($input:expr, $prefix:expr, $want:expr) => {
            assert_eq!(
                munge_raw_path(
                    Path::new(OsStr::from_bytes($input)),
                    Path::new(OsStr::from_bytes($prefix)),
                ),
                PathBuf::from(OsStr::from_bytes($want))
            )
        };
    }

    #[test]
    fn test_munge_raw_path() {
        // Basic relative and absolute cases with ,v suffixes.
        assert_munge!(b"foo", b"", b"foo");
        assert_munge!(b"foo,v", b"", b"foo");
        assert_munge!(b"foo/bar", b"", b"foo/bar");
        assert_munge!(b"/foo", b"", b"/foo");
        assert_munge!(b"/foo,v", b"", b"/foo");
        assert_munge!(b"/foo/bar,v", b"", b"/foo/bar");
        assert_munge!(b"/foo/Attic/bar", b"", b"/foo/bar");

        // Basic Attic cases.
        assert_munge!(b"foo/Attic/bar", b"", b"foo/bar");
        assert_munge!(b"foo/Attic/bar,v", b"", b"foo/bar");
        assert_munge!(b"/foo/Attic/bar", b"", b"/foo/bar");
        assert_munge!(b"/foo/Attic/bar,v", b"", b"/foo/bar");

        // Non-standard Attic cases where it shouldn't be stripped.
        assert_munge!(b"Attic", b"", b"Attic");
        assert_munge!(b"Attic,v", b"", b"Attic");
        assert_munge!(b"foo/Attic", b"", b"foo/Attic");
        assert_munge!(b"/foo/Attic", b"", b"/foo/Attic");
        assert_munge!(
            b"Attic/Attic/Attic/foo/bar,v",
            b"",
            b"Attic/Attic/Attic/foo/bar"
        );
        assert_munge!(b"/Attic/Attic/foo,v", b"", b"/Attic/foo");

        // Prefix stripping.
        assert_munge!(b"/foo/bar/Attic/quux,v", b"/foo/bar", b"quux");
        assert_munge!(b"/foo/bar/quux,v", b"/bar", b"/foo/bar/quux");
    }
}
