use std::{error, fmt, io, string::FromUtf8Error};

use camino::FromPathBufError;

use crate::path::{FsPathBuf, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    NotFound(FsPathBuf),
    NotADirectory(FsPathBuf),
    Loop(FsPathBuf),
    Illegal(String, Option<String>),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "Folder does not exist: {path}"),
            Self::NotADirectory(path) => write!(f, "Not a folder: {path}"),
            Self::Loop(path) => write!(f, "Folder contains itself (symlink loop): {path}"),
            Self::Illegal(path, None) => write!(f, "Illegal path: {path}"),
            Self::Illegal(path, Some(reason)) => write!(f, "{reason}: {path}"),
        }
    }
}

impl error::Error for PathError {}

#[derive(Debug, Clone)]
pub enum Error {
    Usage(String),
    Path(PathError),
    Utf8(String),
    Io(String),
    Auth(String),
    Api(String),
    Bug(String),
    Other(String),
    /// An error that occurred while processing the given logical path.
    At { path: PathBuf, error: Box<Error> },
}

impl Error {
    /// Attaches the logical path where the error happened.
    /// An error already located is left untouched, so that the innermost location wins.
    pub fn at(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::At { .. } => self,
            error => Self::At {
                path: path.into(),
                error: Box::new(error),
            },
        }
    }

    /// The error without location
    pub fn kind(&self) -> &Error {
        match self {
            Self::At { error, .. } => error.kind(),
            _ => self,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            Self::Usage(..) => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(msg) => write!(f, "Usage error: {msg}"),
            Self::Path(err) => err.fmt(f),
            Self::Utf8(msg) => write!(f, "Non UTF-8 string: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Auth(msg) => write!(f, "Authorization error: {msg}"),
            Self::Api(msg) => write!(f, "API error: {msg}"),
            Self::Bug(msg) => write!(f, "Sitepush bug error: {msg}"),
            Self::Other(msg) => f.write_str(msg),
            Self::At { path, error } => write!(f, "{path}: {error}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Path(err) => Some(err),
            Error::At { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<PathError> for Error {
    fn from(value: PathError) -> Self {
        Self::Path(value)
    }
}

impl From<FromUtf8Error> for Error {
    fn from(value: FromUtf8Error) -> Self {
        Self::Utf8(String::from_utf8_lossy(&value.into_bytes()).to_string())
    }
}

impl From<FromPathBufError> for Error {
    fn from(value: FromPathBufError) -> Self {
        Self::Utf8(value.as_path().as_os_str().to_string_lossy().to_string())
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Other(format!("JSON error: {value}"))
    }
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(format!("{value:#}"))
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Other(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! io_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Io(format!($($t)*)))
    };
}

#[macro_export]
macro_rules! api_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Api(format!($($t)*)))
    };
}

#[macro_export]
macro_rules! auth_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Auth(format!($($t)*)))
    };
}

#[macro_export]
macro_rules! bug_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Bug(format!($($t)*)))
    };
}

#[macro_export]
macro_rules! other_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Other(format!($($t)*)))
    };
}

#[macro_export]
macro_rules! io_error {
    ($($t:tt)*) => {
        $crate::Error::Io(format!($($t)*))
    };
}

#[macro_export]
macro_rules! auth_error {
    ($($t:tt)*) => {
        $crate::Error::Auth(format!($($t)*))
    };
}

#[macro_export]
macro_rules! api_error {
    ($($t:tt)*) => {
        $crate::Error::Api(format!($($t)*))
    };
}

#[macro_export]
macro_rules! bug_error {
    ($($t:tt)*) => {
        $crate::Error::Bug(format!($($t)*))
    };
}

#[macro_export]
macro_rules! other_error {
    ($($t:tt)*) => {
        $crate::Error::Other(format!($($t)*))
    };
}
