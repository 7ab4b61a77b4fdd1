//! FAT directory entries, including VFAT long file names.

use binrw::{io::Cursor, BinRead};
use bstr::ByteSlice;

pub(super) const DIR_ENTRY_SIZE: usize = 0x20;

const ATTR_VOLUME_ID: u8 = 0x08;
const ATTR_DIRECTORY: u8 = 0x10;
const ATTR_LONG_NAME: u8 = 0x0f;

const LFN_LAST_ENTRY: u8 = 0x40;
const LFN_CHARS_PER_ENTRY: usize = 13;

const NT_LOWERCASE_BASE: u8 = 0x08;
const NT_LOWERCASE_EXT: u8 = 0x10;

#[binrw::binrw]
#[brw(little)]
#[derive(Debug, Clone)]
struct RawDirEntry {
    name: [u8; 11],
    attr: u8,
    nt_flags: u8,
    create_time_tenth: u8,
    create_time: u16,
    create_date: u16,
    access_date: u16,
    cluster_hi: u16,
    write_time: u16,
    write_date: u16,
    cluster_lo: u16,
    size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub short_name: String,
    pub is_dir: bool,
    pub first_cluster: u32,
    pub size: u32,
}

impl DirEntry {
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.short_name.eq_ignore_ascii_case(name)
    }
}

struct PendingLfn {
    checksum: u8,
    chars: Vec<u16>,
}

fn lfn_checksum(short_name: &[u8; 11]) -> u8 {
    short_name
        .iter()
        .fold(0u8, |sum, c| (sum >> 1 | sum << 7).wrapping_add(*c))
}

fn short_name(raw: &RawDirEntry) -> String {
    let mut base = raw.name[..8].trim_end_with(|c| c == ' ').to_vec();
    let mut ext = raw.name[8..].trim_end_with(|c| c == ' ').to_vec();

    // 0x05 stands in for a real 0xe5 lead byte
    if base.first() == Some(&0x05) {
        base[0] = 0xe5;
    }
    if raw.nt_flags & NT_LOWERCASE_BASE != 0 {
        base.make_ascii_lowercase();
    }
    if raw.nt_flags & NT_LOWERCASE_EXT != 0 {
        ext.make_ascii_lowercase();
    }

    let mut name = base.to_str_lossy().into_owned();
    if !ext.is_empty() {
        name.push('.');
        name.push_str(&ext.to_str_lossy());
    }
    name
}

/// Parses the raw bytes of a directory, stopping at the end marker. `.`, `..`, deleted
/// entries and the volume label are skipped.
pub(super) fn parse_dir(buf: &[u8]) -> Vec<DirEntry> {
    let mut entries = Vec::new();
    let mut lfn: Option<PendingLfn> = None;

    for chunk in buf.chunks_exact(DIR_ENTRY_SIZE) {
        match chunk[0] {
            0x00 => break,
            0xe5 => {
                lfn = None;
                continue;
            }
            _ => {}
        }

        if chunk[11] == ATTR_LONG_NAME {
            let seq = chunk[0];
            let index = (seq & 0x1f) as usize;
            if index == 0 {
                lfn = None;
                continue;
            }

            if seq & LFN_LAST_ENTRY != 0 {
                lfn = Some(PendingLfn {
                    checksum: chunk[13],
                    chars: vec![0xffff; index * LFN_CHARS_PER_ENTRY],
                });
            }

            match lfn.as_mut() {
                Some(pending)
                    if pending.checksum == chunk[13]
                        && index * LFN_CHARS_PER_ENTRY <= pending.chars.len() =>
                {
                    let units = chunk[1..11]
                        .chunks_exact(2)
                        .chain(chunk[14..26].chunks_exact(2))
                        .chain(chunk[28..32].chunks_exact(2))
                        .map(|c| u16::from_le_bytes([c[0], c[1]]));

                    let start = (index - 1) * LFN_CHARS_PER_ENTRY;
                    for (slot, unit) in pending.chars[start..].iter_mut().zip(units) {
                        *slot = unit;
                    }
                }
                _ => lfn = None,
            }
            continue;
        }

        let Ok(raw) = RawDirEntry::read(&mut Cursor::new(chunk)) else {
            break;
        };
        let pending = lfn.take();

        if raw.attr & ATTR_VOLUME_ID != 0 || raw.name[0] == b'.' {
            continue;
        }

        let short_name = short_name(&raw);
        let name = pending
            .filter(|p| p.checksum == lfn_checksum(&raw.name))
            .and_then(|p| {
                let end = p
                    .chars
                    .iter()
                    .position(|c| *c == 0 || *c == 0xffff)
                    .unwrap_or(p.chars.len());
                String::from_utf16(&p.chars[..end]).ok()
            })
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| short_name.clone());

        entries.push(DirEntry {
            name,
            short_name,
            is_dir: raw.attr & ATTR_DIRECTORY != 0,
            first_cluster: (raw.cluster_hi as u32) << 16 | raw.cluster_lo as u32,
            size: raw.size,
        });
    }

    entries
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;

    /// Encodes a directory entry, preceded by long name entries if `long` is given.
    pub fn encode_entry(
        long: Option<&str>,
        short: &[u8; 11],
        nt_flags: u8,
        attr: u8,
        cluster: u32,
        size: u32,
    ) -> Vec<u8> {
        let mut out = Vec::new();

        if let Some(long) = long {
            let mut units: Vec<u16> = long.encode_utf16().collect();
            if units.len() % LFN_CHARS_PER_ENTRY != 0 {
                units.push(0);
            }
            while units.len() % LFN_CHARS_PER_ENTRY != 0 {
                units.push(0xffff);
            }

            let count = units.len() / LFN_CHARS_PER_ENTRY;
            for index in (1..=count).rev() {
                let mut e = [0u8; DIR_ENTRY_SIZE];
                e[0] = index as u8 | if index == count { LFN_LAST_ENTRY } else { 0 };
                e[11] = ATTR_LONG_NAME;
                e[13] = lfn_checksum(short);

                let part = &units[(index - 1) * LFN_CHARS_PER_ENTRY..][..LFN_CHARS_PER_ENTRY];
                let offsets = (1..11)
                    .step_by(2)
                    .chain((14..26).step_by(2))
                    .chain((28..32).step_by(2));
                for (offset, unit) in offsets.zip(part) {
                    e[offset..][..2].copy_from_slice(&unit.to_le_bytes());
                }
                out.extend_from_slice(&e);
            }
        }

        let mut e = [0u8; DIR_ENTRY_SIZE];
        e[..11].copy_from_slice(short);
        e[11] = attr;
        e[12] = nt_flags;
        e[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
        e[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
        e[28..32].copy_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&e);

        out
    }

    #[test]
    fn short_names_and_case_flags() {
        let mut buf = encode_entry(None, b"MOVABLE SED", 0x18, 0x20, 5, 0x140);
        buf.extend(encode_entry(None, b"README     ", 0, 0x20, 6, 1));
        buf.extend(encode_entry(None, b"\x05BC     TXT", 0, 0x20, 7, 1));

        let names: Vec<_> = parse_dir(&buf).into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["movable.sed", "README", "\u{fffd}BC.TXT"]);
    }

    #[test]
    fn long_names_and_skipped_entries() {
        let long = "0123456789abcdef0123456789abcdef";

        let mut buf = encode_entry(None, b"NAND       ", 0, ATTR_VOLUME_ID, 0, 0);
        buf.extend(encode_entry(None, b".          ", 0, ATTR_DIRECTORY, 3, 0));
        buf.extend(encode_entry(None, b"..         ", 0, ATTR_DIRECTORY, 0, 0));
        let mut deleted = encode_entry(None, b"OLD     BIN", 0, 0x20, 9, 9);
        deleted[0] = 0xe5;
        buf.extend(deleted);
        buf.extend(encode_entry(Some(long), b"012345~1   ", 0, ATTR_DIRECTORY, 0x12345, 0));
        buf.extend(encode_entry(Some("exactly13char"), b"EXACTL~1   ", 0, 0x20, 4, 3));
        buf.extend([0u8; DIR_ENTRY_SIZE]);
        buf.extend(encode_entry(None, b"HIDDEN     ", 0, 0x20, 4, 3));

        let entries = parse_dir(&buf);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].name, long);
        assert_eq!(entries[0].short_name, "012345~1");
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].first_cluster, 0x12345);
        assert!(entries[0].matches("0123456789ABCDEF0123456789ABCDEF"));
        assert!(entries[0].matches("012345~1"));

        assert_eq!(entries[1].name, "exactly13char");
        assert!(!entries[1].is_dir);
    }

    #[test]
    fn orphaned_long_name_falls_back_to_short_name() {
        let mut buf = encode_entry(Some("a long name.txt"), b"ALONGN~1TXT", 0, 0x20, 4, 3);
        // corrupt the short name so the checksum no longer matches
        let short_at = buf.len() - DIR_ENTRY_SIZE;
        buf[short_at] = b'B';

        let entries = parse_dir(&buf);
        assert_eq!(entries[0].name, "BLONGN~1.TXT");
    }
}
