use std::path::PathBuf;

/// Errors produced while fetching and unpacking an image.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Filesystem I/O or permission failure.
    #[error("{op} {}", .path.display())]
    Storage {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A path that must be a directory exists as something else.
    #[error("path {} is not a directory", .path.display())]
    Conflict { path: PathBuf },

    #[error("invalid manifest format {raw:?}")]
    MalformedManifest {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported manifest {field}: {actual}, expect {expected}")]
    UnsupportedFormat {
        field: String,
        expected: String,
        actual: String,
    },

    /// Gzip or tar stream corruption, or an entry that cannot be placed safely.
    #[error("{op} {}: {reason}", .path.display())]
    Archive {
        op: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("transfer {image}: {reason}")]
    Transfer { image: String, reason: String },

    /// Invalid manifest read back from a cache entry, annotated with its path.
    #[error("cached manifest {}", .path.display())]
    CachedManifest {
        path: PathBuf,
        #[source]
        source: Box<FetchError>,
    },

    /// Extraction failure annotated with the layer it happened in.
    #[error("extract {digest:?}")]
    Layer {
        digest: String,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    pub(crate) fn storage(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Storage {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive(op: &'static str, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        FetchError::Archive {
            op,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unsupported(field: impl Into<String>, expected: impl ToString, actual: impl ToString) -> Self {
        FetchError::UnsupportedFormat {
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FetchError>;
