//! DISA save containers.
//!
//! A DISA holds one or two partitions behind a partition table whose SHA-256 is recorded
//! in the header. Only the raw data regions are extracted, the descriptors inside the
//! table are never interpreted.

mod header;

pub use header::*;

use binrw::{io::Cursor, BinRead};
use core::fmt;
use sha2::{Digest, Sha256};

use crate::{
    storage::{FromStorage, IStorage, Storage},
    AutocopyError, AutocopyResult,
};

/// Offset into a partition's data region where the usable payload starts.
/// Found empirically; everything before it is filesystem scaffolding of the save.
pub const SKIP_DISTANCE: u64 = 0x9000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartitionSlot {
    A,
    B,
}

impl PartitionSlot {
    /// Name of the output file payloads of this slot get written to.
    pub fn file_name(self) -> &'static str {
        match self {
            PartitionSlot::A => "partitionA.bin",
            PartitionSlot::B => "partitionB.bin",
        }
    }

    fn index(self) -> usize {
        match self {
            PartitionSlot::A => 0,
            PartitionSlot::B => 1,
        }
    }
}

impl fmt::Display for PartitionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionSlot::A => f.write_str("partition A"),
            PartitionSlot::B => f.write_str("partition B"),
        }
    }
}

/// Which container layout the caller is after.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpectedPartitions {
    /// exactly one partition, only slot A is extracted
    #[default]
    Single,
    /// one or two partitions, slot B is extracted when present
    Dual,
}

impl ExpectedPartitions {
    fn max(self) -> u32 {
        match self {
            ExpectedPartitions::Single => 1,
            ExpectedPartitions::Dual => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisaOptions {
    /// Reject version, structure and table hash problems. The magic is checked regardless.
    pub strict: bool,
    pub expected: ExpectedPartitions,
}

impl Default for DisaOptions {
    fn default() -> Self {
        Self {
            strict: true,
            expected: ExpectedPartitions::Single,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPartitions {
    pub a: Vec<u8>,
    /// `None` if the container has no second partition, or it could not be read.
    pub b: Option<Vec<u8>>,
}

impl ExtractedPartitions {
    pub fn into_slots(self) -> Vec<(PartitionSlot, Vec<u8>)> {
        let mut slots = vec![(PartitionSlot::A, self.a)];
        slots.extend(self.b.map(|b| (PartitionSlot::B, b)));
        slots
    }
}

#[derive(Debug)]
pub struct Disa {
    storage: Storage,
    header: DisaHeader,
    opts: DisaOptions,
}

impl Disa {
    /// Reads and validates the header and the active partition table.
    pub fn parse(storage: Storage, opts: DisaOptions) -> AutocopyResult<Self> {
        let mut buf = [0; DISA_HEADER_SIZE];
        if storage.read_exact_at(DISA_HEADER_OFFSET, &mut buf).is_err() {
            let mut magic = [0; 4];
            storage.read_at(DISA_HEADER_OFFSET, &mut magic)?;
            return Err(AutocopyError::NotThisFormat { magic });
        }

        let header = DisaHeader::read(&mut Cursor::new(&buf))?;
        if !header.has_valid_magic() {
            return Err(AutocopyError::NotThisFormat {
                magic: header.magic,
            });
        }

        let this = Self {
            storage,
            header,
            opts,
        };
        this.check_version()?;
        this.check_partition_count()?;
        this.check_table()?;

        Ok(this)
    }

    /// Reports a validation failure, or just logs it when not in strict mode.
    fn relax(&self, err: AutocopyError) -> AutocopyResult<()> {
        if self.opts.strict {
            return Err(err);
        }

        log::warn!("ignoring: {err}");
        Ok(())
    }

    fn check_version(&self) -> AutocopyResult<()> {
        if self.header.version == DISA_VERSION {
            return Ok(());
        }

        self.relax(AutocopyError::VersionMismatch {
            expected: DISA_VERSION,
            found: self.header.version,
        })
    }

    fn check_partition_count(&self) -> AutocopyResult<()> {
        let cnt = self.header.partition_count;
        let max = self.opts.expected.max();

        if !(1..=2).contains(&cnt) {
            return self.relax(AutocopyError::Structure(format!(
                "partition count is {cnt}, must be 1 or 2"
            )));
        }
        if cnt > max {
            return self.relax(AutocopyError::Structure(format!(
                "container has {cnt} partitions, expected at most {max}"
            )));
        }

        Ok(())
    }

    /// Offset of the partition table the header marks as active. Unknown selectors fall
    /// back to the primary table when not strict.
    pub fn active_table_offset(&self) -> AutocopyResult<u64> {
        match self.header.active_table {
            0 => Ok(self.header.primary_table_offset),
            1 => Ok(self.header.secondary_table_offset),
            other => {
                self.relax(AutocopyError::Structure(format!(
                    "active table selector is {other}, must be 0 or 1"
                )))?;
                Ok(self.header.primary_table_offset)
            }
        }
    }

    pub fn partition_table(&self) -> AutocopyResult<Vec<u8>> {
        let offset = self.active_table_offset()?;
        log::debug!(
            "partition table at {offset:#x}, {:#x} bytes",
            self.header.table_size
        );

        self.storage
            .read_vec_at(offset, self.header.table_size)
            .map_err(|e| {
                AutocopyError::Structure(format!(
                    "partition table at {offset:#x} ({:#x} bytes) is unreadable: {e}",
                    self.header.table_size
                ))
            })
    }

    fn check_table(&self) -> AutocopyResult<()> {
        let table = match self.partition_table() {
            Ok(table) => table,
            Err(e) => return self.relax(e),
        };

        let actual = Sha256::digest(&table);
        if actual.as_slice() == self.header.table_hash.0 {
            return Ok(());
        }

        self.relax(AutocopyError::Integrity {
            expected: self.header.table_hash.to_string(),
            actual: hex::encode(actual),
        })
    }

    fn read_payload(&self, slot: PartitionSlot) -> AutocopyResult<Vec<u8>> {
        let range = self.header.partitions[slot.index()];
        let data = self
            .storage
            .clone()
            .split(range.offset, range.size)
            .map_err(|e| AutocopyError::PayloadUnreadable(format!("{slot} data region: {e}")))?;

        log::debug!(
            "{slot} data at {:#x}, {:#x} bytes",
            range.offset,
            range.size
        );

        if range.size <= SKIP_DISTANCE {
            log::warn!(
                "{slot} is only {:#x} bytes, nothing left after skipping {SKIP_DISTANCE:#x}",
                range.size
            );
            return Ok(Vec::new());
        }

        data.read_vec_at(SKIP_DISTANCE, range.size - SKIP_DISTANCE)
    }

    fn wants_partition_b(&self) -> bool {
        self.opts.expected == ExpectedPartitions::Dual && self.header.partition_count >= 2
    }

    /// Extracts the payload of partition A and, for dual partition containers, B.
    pub fn extract(&self) -> AutocopyResult<ExtractedPartitions> {
        let a = self.read_payload(PartitionSlot::A)?;

        let b = if self.wants_partition_b() {
            self.read_payload(PartitionSlot::B)
                .map_err(|e| {
                    log::warn!("container declares a second partition but it is unreadable: {e}")
                })
                .ok()
        } else {
            None
        };

        Ok(ExtractedPartitions { a, b })
    }
}

impl FromStorage for Disa {
    type Args = DisaOptions;
    type Output = AutocopyResult<Self>;

    fn from_storage(parent: Storage, args: Self::Args) -> Self::Output {
        Disa::parse(parent, args)
    }
}
