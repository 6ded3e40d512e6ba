//! Model container source definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a pre-compiled model container is loaded from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerSource {
    /// Container file on the local filesystem.
    File {
        /// Path to the container file.
        path: PathBuf,
    },
    /// Container already held in memory.
    Bytes {
        /// Serialized container contents.
        data: Vec<u8>,
    },
}

impl ContainerSource {
    /// Convenience constructor for a container file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    /// Convenience constructor for an in-memory container.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes { data: data.into() }
    }

    /// Return the file path for file-backed sources.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ContainerSource::File { path } => Some(path.as_path()),
            ContainerSource::Bytes { .. } => None,
        }
    }

    /// Return the buffer for in-memory sources.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            ContainerSource::File { .. } => None,
            ContainerSource::Bytes { data } => Some(data),
        }
    }

    /// Short description used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            ContainerSource::File { path } => format!("file {}", path.display()),
            ContainerSource::Bytes { data } => format!("buffer ({} bytes)", data.len()),
        }
    }
}

impl Default for ContainerSource {
    fn default() -> Self {
        Self::File {
            path: PathBuf::new(),
        }
    }
}

impl From<PathBuf> for ContainerSource {
    fn from(path: PathBuf) -> Self {
        Self::File { path }
    }
}

impl From<&Path> for ContainerSource {
    fn from(path: &Path) -> Self {
        Self::file(path)
    }
}

impl From<Vec<u8>> for ContainerSource {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes { data }
    }
}

// Avoid dumping whole containers into logs.
impl fmt::Debug for ContainerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerSource::File { path } => f.debug_struct("File").field("path", path).finish(),
            ContainerSource::Bytes { data } => {
                f.debug_struct("Bytes").field("len", &data.len()).finish()
            }
        }
    }
}
