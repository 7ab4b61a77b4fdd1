//! MBR boot sector, only as much as is needed to find the first partition.

use binrw::{io::Cursor, BinRead};

use crate::{
    storage::{FromStorage, IStorage, Storage},
    AutocopyError, AutocopyResult,
};

pub const SECTOR_SIZE: u64 = 0x200;

const BOOT_SIGNATURE: u16 = 0xaa55;

#[binrw::binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MbrPartitionEntry {
    pub status: u8,
    pub chs_start: [u8; 3],
    pub partition_type: u8,
    pub chs_end: [u8; 3],
    pub start_lba: u32,
    pub sector_count: u32,
}

impl MbrPartitionEntry {
    pub fn is_empty(&self) -> bool {
        self.start_lba == 0 && self.sector_count == 0
    }
}

#[binrw::binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub struct BootSector {
    #[brw(pad_before = 0x1be)]
    pub partitions: [MbrPartitionEntry; 4],
    pub signature: u16,
}

impl BootSector {
    pub fn from_buf(buf: &[u8]) -> AutocopyResult<Self> {
        let hdr = BootSector::read(&mut Cursor::new(buf))?;

        if hdr.signature != BOOT_SIGNATURE {
            return Err(AutocopyError::Format(format!(
                "no boot sector signature (found {:#06x})",
                hdr.signature
            )));
        }

        Ok(hdr)
    }

    /// Locates the first partition. Every other entry is ignored.
    pub fn first_partition(&self) -> AutocopyResult<PartitionLocation> {
        let entry = &self.partitions[0];
        if entry.is_empty() {
            return Err(AutocopyError::Format("first partition entry is empty".into()));
        }

        Ok(PartitionLocation {
            offset: entry.start_lba as u64 * SECTOR_SIZE,
            size: entry.sector_count as u64 * SECTOR_SIZE,
        })
    }
}

impl FromStorage for BootSector {
    type Args = ();
    type Output = AutocopyResult<Self>;

    fn from_storage(parent: Storage, _: Self::Args) -> Self::Output {
        let mut buf = [0; SECTOR_SIZE as usize];
        parent
            .read_exact_at(0, &mut buf)
            .map_err(|_| AutocopyError::Format("volume is too small for a boot sector".into()))?;

        BootSector::from_buf(&buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionLocation {
    pub offset: u64,
    pub size: u64,
}

/// Finds the first partition of `volume` and returns a view of it. A partition running
/// past the end of the volume is truncated to what is actually there.
pub fn open_first_partition(volume: &Storage) -> AutocopyResult<(PartitionLocation, Storage)> {
    let location = volume
        .clone()
        .map_to_storage::<BootSector>(())?
        .first_partition()?;

    let volume_len = volume.length()?;
    if location.offset >= volume_len {
        return Err(AutocopyError::Format(format!(
            "partition starts at {:#x}, past the end of the volume ({volume_len:#x})",
            location.offset
        )));
    }

    let size = core::cmp::min(location.size, volume_len - location.offset);
    if size != location.size {
        log::warn!(
            "partition at {:#x} declares {:#x} bytes but the volume only has {size:#x}",
            location.offset,
            location.size
        );
    }

    log::debug!("first partition at {:#x}, {size:#x} bytes", location.offset);
    let partition = volume.clone().split(location.offset, size)?;

    Ok((location, partition))
}
