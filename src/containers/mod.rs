pub mod disa;
pub mod fat;
pub mod mbr;

use crate::{storage::Storage, AutocopyResult};

/// Read-only access to a hierarchical filesystem. Paths are absolute and `/`-separated.
pub trait FileSystem {
    /// Opens the file at `path`, failing with [`crate::AutocopyError::PathNotFound`]
    /// if nothing is there.
    fn open_file(&self, path: &str) -> AutocopyResult<Storage>;

    /// Names of the entries of the directory at `path`, in on-disk order.
    fn read_dir(&self, path: &str) -> AutocopyResult<Vec<String>>;
}

/// Turns a partition into a [`FileSystem`].
pub trait Mount {
    fn mount(&self, partition: Storage) -> AutocopyResult<Box<dyn FileSystem>>;
}

pub(crate) fn path_components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}
