//! Logical paths of the remote tree.
//! sitepush::path is used for remote paths (always `/` separated),
//! whereas camino is used for the local file system.
use std::borrow;
use std::fmt;
use std::ops;
use std::str;

use serde::{Deserialize, Serialize};

pub type FsPath = camino::Utf8Path;
pub type FsPathBuf = camino::Utf8PathBuf;

pub const SEPARATOR: char = '/';
pub const SEPARATOR_STR: &str = "/";

/// An unsized logical path, such as `/static-web-hosting/my-site`.
///
/// Empty segments and `.` are meaningless and skipped by [`Path::segments`],
/// so `//a/./b/` and `/a/b` designate the same remote folder.
#[repr(transparent)]
pub struct Path {
    inner: str,
}

impl Path {
    pub fn new<S: AsRef<str> + ?Sized>(path: &S) -> &Path {
        unsafe { &*(path.as_ref() as *const str as *const Path) }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf {
            inner: self.inner.to_string(),
        }
    }

    /// Iterates over the meaningful segments of the path, root first.
    ///
    /// ```
    /// use sitepush::path::Path;
    ///
    /// let segs: Vec<_> = Path::new("//static-web-hosting/./site/").segments().collect();
    /// assert_eq!(segs, ["static-web-hosting", "site"]);
    /// ```
    pub fn segments(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.inner
            .split(SEPARATOR)
            .filter(|seg| !seg.is_empty() && *seg != ".")
    }

    /// Returns `true` if the path designates the root of the store.
    pub fn is_root(&self) -> bool {
        self.segments().next().is_none()
    }

    /// The last segment, if any
    pub fn file_name(&self) -> Option<&str> {
        self.segments().next_back()
    }

    /// Builds a new path by appending `name`.
    /// The result is always absolute and without empty segments.
    pub fn join<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        let mut buf = self.normalized();
        buf.push(name);
        buf
    }

    /// Rebuilds the path from its segments, with a leading separator.
    pub fn normalized(&self) -> PathBuf {
        let mut inner = String::with_capacity(self.inner.len() + 1);
        for seg in self.segments() {
            inner.push(SEPARATOR);
            inner.push_str(seg);
        }
        if inner.is_empty() {
            inner.push(SEPARATOR);
        }
        PathBuf { inner }
    }
}

/// An owned logical path
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathBuf {
    inner: String,
}

impl PathBuf {
    pub fn root() -> PathBuf {
        PathBuf {
            inner: SEPARATOR_STR.to_string(),
        }
    }

    pub fn as_path(&self) -> &Path {
        Path::new(self.inner.as_str())
    }

    pub fn into_string(self) -> String {
        self.inner
    }

    pub fn push<P: AsRef<Path>>(&mut self, path: P) {
        for seg in path.as_ref().segments() {
            if !self.inner.ends_with(SEPARATOR) {
                self.inner.push(SEPARATOR);
            }
            self.inner.push_str(seg);
        }
    }
}

impl Default for PathBuf {
    fn default() -> Self {
        PathBuf::root()
    }
}

impl ops::Deref for PathBuf {
    type Target = Path;

    fn deref(&self) -> &Path {
        self.as_path()
    }
}

impl borrow::Borrow<Path> for PathBuf {
    fn borrow(&self) -> &Path {
        self.as_path()
    }
}

impl ToOwned for Path {
    type Owned = PathBuf;

    fn to_owned(&self) -> PathBuf {
        self.to_path_buf()
    }
}

impl From<String> for PathBuf {
    fn from(inner: String) -> Self {
        PathBuf { inner }
    }
}

impl<T: ?Sized + AsRef<str>> From<&T> for PathBuf {
    fn from(s: &T) -> PathBuf {
        PathBuf::from(s.as_ref().to_string())
    }
}

impl From<PathBuf> for String {
    fn from(value: PathBuf) -> Self {
        value.inner
    }
}

impl str::FromStr for PathBuf {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PathBuf::from(s))
    }
}

impl AsRef<Path> for Path {
    fn as_ref(&self) -> &Path {
        self
    }
}

impl AsRef<Path> for PathBuf {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl AsRef<Path> for str {
    fn as_ref(&self) -> &Path {
        Path::new(self)
    }
}

impl AsRef<Path> for String {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for PathBuf {
    fn as_ref(&self) -> &str {
        self.inner.as_str()
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Path) -> bool {
        self.segments().eq(other.segments())
    }
}

impl Eq for Path {}

impl PartialEq<str> for PathBuf {
    fn eq(&self, other: &str) -> bool {
        self.inner == other
    }
}

impl PartialEq<&str> for PathBuf {
    fn eq(&self, other: &&str) -> bool {
        self.inner == *other
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl fmt::Debug for PathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for PathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}
