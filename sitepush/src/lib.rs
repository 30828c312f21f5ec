pub mod config;
pub mod entry;
pub mod id;
pub mod loc;
pub mod oauth;
pub mod path;

mod error;

pub use crate::config::Config;
pub use crate::entry::{Kind, LocalEntry, Named, RemoteEntry};
pub use crate::error::{Error, PathError, Result};
