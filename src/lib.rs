#![deny(clippy::unwrap_used)]

extern crate alloc;

pub mod common;
pub mod containers;
pub mod error;
pub mod extract;
pub mod image;
pub mod storage;
pub mod upload;
pub mod utils;

pub use error::{AutocopyError, AutocopyResult};

pub mod prelude {
    pub use super::{
        common::Id0,
        containers::{
            disa::{Disa, DisaOptions, ExpectedPartitions, PartitionSlot},
            fat::{FatFileSystem, FatMount},
            FileSystem, Mount,
        },
        extract::{ExtractOptions, Extractor},
        image::{AesCtrImage, ImageOpener, RawImage},
        storage::{FileStorage, IStorage, Storage, VecStorage},
        AutocopyError, AutocopyResult,
    };
}
