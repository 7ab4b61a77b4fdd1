use crate::utils::HexArray;

pub const DISA_MAGIC: [u8; 4] = *b"DISA";
pub const DISA_VERSION: u32 = 0x40000;

/// The header sits behind a 0x100 byte CMAC that isn't checked here.
pub const DISA_HEADER_OFFSET: u64 = 0x100;
pub const DISA_HEADER_SIZE: usize = 0x100;

#[binrw::binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Range {
    pub offset: u64,
    pub size: u64,
}

impl Range {
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

#[binrw::binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub struct DisaHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub partition_count: u32,
    #[brw(pad_before = 4)]
    pub secondary_table_offset: u64,
    pub primary_table_offset: u64,
    pub table_size: u64,
    /// descriptor location inside the partition table, for A and B
    pub descriptors: [Range; 2],
    /// data location inside the container, for A and B
    pub partitions: [Range; 2],
    #[brw(pad_after = 3)]
    pub active_table: u8,
    #[brw(pad_after = 0x74)]
    pub table_hash: HexArray<0x20>,
}

impl DisaHeader {
    pub fn has_valid_magic(&self) -> bool {
        self.magic == DISA_MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::{io::Cursor, BinRead, BinWrite};

    #[test]
    fn layout_matches_on_disk_offsets() -> binrw::BinResult<()> {
        let hdr = DisaHeader {
            magic: DISA_MAGIC,
            version: DISA_VERSION,
            partition_count: 2,
            secondary_table_offset: 0x1111,
            primary_table_offset: 0x2222,
            table_size: 0x3333,
            descriptors: [
                Range {
                    offset: 0x44,
                    size: 0x55,
                },
                Range {
                    offset: 0x66,
                    size: 0x77,
                },
            ],
            partitions: [
                Range {
                    offset: 0x88,
                    size: 0x99,
                },
                Range {
                    offset: 0xaa,
                    size: 0xbb,
                },
            ],
            active_table: 1,
            table_hash: HexArray([0xcc; 0x20]),
        };

        let mut out = Cursor::new(Vec::new());
        hdr.write(&mut out)?;
        let raw = out.into_inner();

        assert_eq!(raw.len(), DISA_HEADER_SIZE);
        assert_eq!(&raw[..4], b"DISA");
        assert_eq!(raw[0x06], 0x04);
        assert_eq!(raw[0x08], 2);
        assert_eq!(raw[0x10..0x12], [0x11, 0x11]);
        assert_eq!(raw[0x18..0x1a], [0x22, 0x22]);
        assert_eq!(raw[0x20..0x22], [0x33, 0x33]);
        assert_eq!([raw[0x28], raw[0x30], raw[0x38], raw[0x40]], [0x44, 0x55, 0x66, 0x77]);
        assert_eq!([raw[0x48], raw[0x50], raw[0x58], raw[0x60]], [0x88, 0x99, 0xaa, 0xbb]);
        assert_eq!(raw[0x68], 1);
        assert_eq!(raw[0x6b], 0);
        assert_eq!(raw[0x6c..0x8c], [0xcc; 0x20]);
        assert!(raw[0x8c..].iter().all(|b| *b == 0));

        let parsed = DisaHeader::read(&mut Cursor::new(&raw))?;
        assert!(parsed.has_valid_magic());
        assert_eq!(parsed.partitions, hdr.partitions);

        Ok(())
    }
}
