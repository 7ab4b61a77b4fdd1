use super::{DirEntry, FatFileSystem};
use crate::{
    storage::{IStorage, Storage},
    AutocopyError, AutocopyResult,
};

/// A file inside a [`FatFileSystem`], reads are translated through its cluster chain.
#[derive(Debug)]
pub struct FatFile {
    storage: Storage,
    cluster_offsets: Vec<u64>,
    cluster_size: u64,
    size: u64,
}

impl FatFile {
    pub(super) fn open(fs: &FatFileSystem, entry: &DirEntry) -> AutocopyResult<Storage> {
        let chain = fs.cluster_chain(entry.first_cluster)?;
        let size = entry.size as u64;

        if (chain.len() as u64) * fs.cluster_size < size {
            return Err(AutocopyError::Format(format!(
                "{:?} is {size:#x} bytes but only has {} clusters",
                entry.name,
                chain.len()
            )));
        }

        Ok(Self {
            storage: fs.storage.clone(),
            cluster_offsets: chain.into_iter().map(|c| fs.cluster_offset(c)).collect(),
            cluster_size: fs.cluster_size,
            size,
        }
        .into_storage())
    }
}

impl IStorage for FatFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> AutocopyResult<u64> {
        let end = core::cmp::min(self.size, offset.saturating_add(buf.len() as u64));
        let mut pos = offset;

        while pos < end {
            let cluster = (pos / self.cluster_size) as usize;
            let in_cluster = pos % self.cluster_size;
            let len = core::cmp::min(self.cluster_size - in_cluster, end - pos);

            let out = &mut buf[(pos - offset) as usize..][..len as usize];
            self.storage
                .read_exact_at(self.cluster_offsets[cluster] + in_cluster, out)?;
            pos += len;
        }

        Ok(end.saturating_sub(offset))
    }

    fn length(&self) -> AutocopyResult<u64> {
        Ok(self.size)
    }
}
