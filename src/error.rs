#[derive(Debug, thiserror_no_std::Error)]
pub enum AutocopyError {
    #[error("not a DISA container (magic {magic:?})")]
    NotThisFormat { magic: [u8; 4] },

    #[error("unsupported DISA version {found:#x}, expected {expected:#x}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("malformed container: {0}")]
    Structure(String),

    /// The data region of a partition that has to be extracted lies outside the container.
    #[error("partition data unreadable: {0}")]
    PayloadUnreadable(String),

    #[error("partition table hash mismatch (header says {expected}, table hashes to {actual})")]
    Integrity { expected: String, actual: String },

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("device key material unavailable: {0}")]
    KeyMaterialUnavailable(String),

    #[error("invalid format: {0}")]
    Format(String),

    #[error("invalid id0 {0:?}, expected 32 hex characters")]
    InvalidId0(String),

    #[error("binrw error: {0}")]
    BinRwError(#[from] binrw::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("substorage error: {0}")]
    SubStorage(#[from] crate::storage::SubStorageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AutocopyError {
    /// Whether running the container parser with `strict = false` tolerates this error.
    pub fn is_relaxable(&self) -> bool {
        matches!(
            self,
            Self::VersionMismatch { .. } | Self::Structure(_) | Self::Integrity { .. }
        )
    }
}

pub type AutocopyResult<T> = core::result::Result<T, AutocopyError>;
