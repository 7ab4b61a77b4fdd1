//! Read-only FAT12/16/32 filesystem.
//!
//! Only what is needed to walk directories and read files is implemented, the FAT itself
//! is loaded into memory once on mount.

mod dir;
mod file;

pub use dir::DirEntry;
pub use file::FatFile;

use binrw::{io::Cursor, BinRead};

use super::{path_components, FileSystem, Mount};
use crate::{
    storage::{FromStorage, IStorage, Storage},
    AutocopyError, AutocopyResult,
};

#[binrw::binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub struct BiosParameterBlock {
    #[brw(pad_before = 0xb)]
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub root_entry_count: u16,
    pub total_sectors_16: u16,
    pub media: u8,
    pub sectors_per_fat_16: u16,
    pub sectors_per_track: u16,
    pub head_count: u16,
    pub hidden_sectors: u32,
    pub total_sectors_32: u32,
    // FAT32 only, garbage on FAT12/16
    pub sectors_per_fat_32: u32,
    pub ext_flags: u16,
    pub fs_version: u16,
    pub root_cluster: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
    Fat12,
    Fat16,
    Fat32,
}

impl FatType {
    fn from_cluster_count(cnt: u32) -> Self {
        match cnt {
            0..=4084 => FatType::Fat12,
            4085..=65524 => FatType::Fat16,
            _ => FatType::Fat32,
        }
    }

    fn is_end_of_chain(self, entry: u32) -> bool {
        match self {
            FatType::Fat12 => entry >= 0xff8,
            FatType::Fat16 => entry >= 0xfff8,
            FatType::Fat32 => entry >= 0x0fff_fff8,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RootDir {
    /// FAT12/16 root directory region, byte offset and length
    Fixed { offset: u64, len: u64 },
    Cluster(u32),
}

#[derive(Debug)]
pub struct FatFileSystem {
    storage: Storage,
    fat_type: FatType,
    fat: Vec<u8>,
    cluster_size: u64,
    data_offset: u64,
    cluster_count: u32,
    root: RootDir,
}

fn format_err(msg: impl Into<String>) -> AutocopyError {
    AutocopyError::Format(msg.into())
}

impl FatFileSystem {
    pub fn fat_type(&self) -> FatType {
        self.fat_type
    }

    pub fn cluster_size(&self) -> u64 {
        self.cluster_size
    }

    fn fat_entry(&self, cluster: u32) -> Option<u32> {
        let n = cluster as usize;
        match self.fat_type {
            FatType::Fat12 => {
                let off = n + n / 2;
                let raw = u16::from_le_bytes(self.fat.get(off..off + 2)?.try_into().ok()?);
                let entry = if n % 2 == 1 { raw >> 4 } else { raw & 0xfff };
                Some(entry as u32)
            }
            FatType::Fat16 => {
                let raw = self.fat.get(n * 2..n * 2 + 2)?;
                Some(u16::from_le_bytes(raw.try_into().ok()?) as u32)
            }
            FatType::Fat32 => {
                let raw = self.fat.get(n * 4..n * 4 + 4)?;
                Some(u32::from_le_bytes(raw.try_into().ok()?) & 0x0fff_ffff)
            }
        }
    }

    fn is_valid_cluster(&self, cluster: u32) -> bool {
        (2..self.cluster_count + 2).contains(&cluster)
    }

    /// Follows the cluster chain starting at `first`. An empty chain is returned for
    /// cluster 0, which is what empty files point at.
    pub(crate) fn cluster_chain(&self, first: u32) -> AutocopyResult<Vec<u32>> {
        let mut chain = Vec::new();
        if first == 0 {
            return Ok(chain);
        }

        let mut cluster = first;
        loop {
            if !self.is_valid_cluster(cluster) {
                return Err(format_err(format!(
                    "cluster chain points at invalid cluster {cluster:#x}"
                )));
            }
            if chain.len() > self.cluster_count as usize {
                return Err(format_err(format!("cluster chain starting at {first:#x} loops")));
            }
            chain.push(cluster);

            let next = self
                .fat_entry(cluster)
                .ok_or_else(|| format_err(format!("cluster {cluster:#x} is outside the FAT")))?;
            if self.fat_type.is_end_of_chain(next) {
                return Ok(chain);
            }
            cluster = next;
        }
    }

    pub(crate) fn cluster_offset(&self, cluster: u32) -> u64 {
        self.data_offset + (cluster as u64 - 2) * self.cluster_size
    }

    fn read_chain(&self, first: u32) -> AutocopyResult<Vec<u8>> {
        let chain = self.cluster_chain(first)?;
        let mut buf = vec![0; chain.len() * self.cluster_size as usize];
        for (cluster, out) in chain.iter().zip(buf.chunks_exact_mut(self.cluster_size as usize)) {
            self.storage.read_exact_at(self.cluster_offset(*cluster), out)?;
        }
        Ok(buf)
    }

    fn root_entries(&self) -> AutocopyResult<Vec<DirEntry>> {
        let raw = match self.root {
            RootDir::Fixed { offset, len } => self.storage.read_vec_at(offset, len)?,
            RootDir::Cluster(cluster) => self.read_chain(cluster)?,
        };
        Ok(dir::parse_dir(&raw))
    }

    fn dir_entries(&self, dir: Option<&DirEntry>) -> AutocopyResult<Vec<DirEntry>> {
        match dir {
            None => self.root_entries(),
            // some formatters point `..` of first level dirs at cluster 0
            Some(e) if e.first_cluster == 0 => self.root_entries(),
            Some(e) => Ok(dir::parse_dir(&self.read_chain(e.first_cluster)?)),
        }
    }

    /// Walks `path`, returning `None` for the root directory itself.
    fn lookup(&self, path: &str) -> AutocopyResult<Option<DirEntry>> {
        let mut current: Option<DirEntry> = None;

        for component in path_components(path) {
            if current.as_ref().is_some_and(|e| !e.is_dir) {
                return Err(AutocopyError::PathNotFound(path.into()));
            }

            let next = self
                .dir_entries(current.as_ref())?
                .into_iter()
                .find(|e| e.matches(component))
                .ok_or_else(|| AutocopyError::PathNotFound(path.into()))?;
            current = Some(next);
        }

        Ok(current)
    }
}

impl FromStorage for FatFileSystem {
    type Args = ();
    type Output = AutocopyResult<Self>;

    fn from_storage(parent: Storage, _: Self::Args) -> Self::Output {
        let mut buf = [0; 0x200];
        parent
            .read_exact_at(0, &mut buf)
            .map_err(|_| format_err("partition is too small for a FAT boot sector"))?;
        let bpb = BiosParameterBlock::read(&mut Cursor::new(&buf))?;

        if !matches!(bpb.bytes_per_sector, 0x200 | 0x400 | 0x800 | 0x1000) {
            return Err(format_err(format!(
                "not a FAT filesystem (bytes per sector {:#x})",
                bpb.bytes_per_sector
            )));
        }
        if !bpb.sectors_per_cluster.is_power_of_two()
            || bpb.fat_count == 0
            || bpb.reserved_sectors == 0
        {
            return Err(format_err("not a FAT filesystem (bad cluster or FAT layout)"));
        }

        let sector_size = bpb.bytes_per_sector as u64;
        let sectors_per_fat = match bpb.sectors_per_fat_16 {
            0 => bpb.sectors_per_fat_32 as u64,
            n => n as u64,
        };
        let total_sectors = match bpb.total_sectors_16 {
            0 => bpb.total_sectors_32 as u64,
            n => n as u64,
        };
        let root_dir_len = bpb.root_entry_count as u64 * dir::DIR_ENTRY_SIZE as u64;
        let root_dir_sectors = root_dir_len.div_ceil(sector_size);

        let fat_offset = bpb.reserved_sectors as u64 * sector_size;
        let root_offset = fat_offset + bpb.fat_count as u64 * sectors_per_fat * sector_size;
        let first_data_sector = root_offset / sector_size + root_dir_sectors;

        let data_sectors = total_sectors
            .checked_sub(first_data_sector)
            .filter(|_| sectors_per_fat != 0)
            .ok_or_else(|| format_err("FAT layout exceeds the partition"))?;
        let cluster_count = u32::try_from(data_sectors / bpb.sectors_per_cluster as u64)
            .map_err(|_| format_err("too many clusters"))?;
        let fat_type = FatType::from_cluster_count(cluster_count);

        let root = match fat_type {
            FatType::Fat32 => RootDir::Cluster(bpb.root_cluster),
            _ => RootDir::Fixed {
                offset: root_offset,
                len: root_dir_len,
            },
        };

        log::debug!(
            "mounted {fat_type:?}: {cluster_count} clusters of {:#x} bytes, FAT at {fat_offset:#x}",
            sector_size * bpb.sectors_per_cluster as u64
        );

        let fat = parent
            .read_vec_at(fat_offset, sectors_per_fat * sector_size)
            .map_err(|_| format_err("FAT runs past the end of the partition"))?;

        Ok(Self {
            fat,
            storage: parent,
            fat_type,
            cluster_size: sector_size * bpb.sectors_per_cluster as u64,
            data_offset: first_data_sector * sector_size,
            cluster_count,
            root,
        })
    }
}

impl FileSystem for FatFileSystem {
    fn open_file(&self, path: &str) -> AutocopyResult<Storage> {
        match self.lookup(path)? {
            Some(entry) if !entry.is_dir => FatFile::open(self, &entry),
            _ => Err(AutocopyError::PathNotFound(path.into())),
        }
    }

    fn read_dir(&self, path: &str) -> AutocopyResult<Vec<String>> {
        match self.lookup(path)? {
            Some(entry) if !entry.is_dir => Err(AutocopyError::PathNotFound(path.into())),
            dir => Ok(self
                .dir_entries(dir.as_ref())?
                .into_iter()
                .map(|e| e.name)
                .collect()),
        }
    }
}

/// Mounts partitions as [`FatFileSystem`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct FatMount;

impl Mount for FatMount {
    fn mount(&self, partition: Storage) -> AutocopyResult<Box<dyn FileSystem>> {
        Ok(Box::new(partition.map_to_storage::<FatFileSystem>(())?))
    }
}
