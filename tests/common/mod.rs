#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use aes::{
    cipher::{KeyIvInit, StreamCipher},
    Aes128,
};
use autocopy::{
    common::KeyY,
    containers::disa::{
        DisaHeader, Range, DISA_HEADER_OFFSET, DISA_MAGIC, DISA_VERSION, SKIP_DISTANCE,
    },
    extract::path::{container_path, KEY_Y_OFFSET, MOVABLE_SED_PATH},
    prelude::*,
    utils::HexArray,
};
use binrw::{io::Cursor, BinWrite};
use sha2::{Digest, Sha256};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const TABLE_OFFSET: u64 = 0x200;
const TABLE_SIZE: u64 = 0x80;
const DATA_OFFSET: u64 = 0x400;

/// Builds a DISA container whose partitions carry `a` and optionally `b` after the skip
/// distance.
#[derive(Debug, Clone)]
pub struct DisaBuilder {
    pub header: DisaHeader,
    table: Vec<u8>,
    data: Vec<Vec<u8>>,
}

impl DisaBuilder {
    pub fn new(a: &[u8], b: Option<&[u8]>) -> Self {
        let table: Vec<u8> = (0..TABLE_SIZE).map(|i| (i * 7) as u8).collect();

        let data: Vec<Vec<u8>> = [Some(a), b]
            .into_iter()
            .flatten()
            .map(|payload| {
                let mut region = vec![0xee; SKIP_DISTANCE as usize];
                region.extend_from_slice(payload);
                region
            })
            .collect();

        let mut partitions = [Range::default(); 2];
        let mut offset = DATA_OFFSET;
        for (range, region) in partitions.iter_mut().zip(&data) {
            *range = Range {
                offset,
                size: region.len() as u64,
            };
            offset += region.len() as u64;
        }

        let header = DisaHeader {
            magic: DISA_MAGIC,
            version: DISA_VERSION,
            partition_count: data.len() as u32,
            secondary_table_offset: TABLE_OFFSET + TABLE_SIZE,
            primary_table_offset: TABLE_OFFSET,
            table_size: TABLE_SIZE,
            descriptors: [
                Range {
                    offset: 0,
                    size: 0x40,
                },
                Range {
                    offset: 0x40,
                    size: 0x40,
                },
            ],
            partitions,
            active_table: 0,
            table_hash: HexArray(Sha256::digest(&table).into()),
        };

        Self { header, table, data }
    }

    pub fn corrupt_table_hash(mut self) -> Self {
        self.header.table_hash.0[0] ^= 0xff;
        self
    }

    pub fn magic(mut self, magic: [u8; 4]) -> Self {
        self.header.magic = magic;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0; DATA_OFFSET as usize];

        let mut hdr = Cursor::new(Vec::new());
        self.header.write(&mut hdr).unwrap();
        let hdr = hdr.into_inner();
        out[DISA_HEADER_OFFSET as usize..][..hdr.len()].copy_from_slice(&hdr);
        out[TABLE_OFFSET as usize..][..self.table.len()].copy_from_slice(&self.table);

        for region in &self.data {
            out.extend_from_slice(region);
        }
        out
    }
}

/// `movable.sed` with `key_y` at its usual offset.
pub fn movable_sed(key_y: &KeyY) -> Vec<u8> {
    let mut sed = vec![0; 0x140];
    sed[KEY_Y_OFFSET as usize..][..key_y.len()].copy_from_slice(key_y);
    sed
}

/// In-memory filesystem. Directories exist implicitly through the files below them.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemFs {
    pub fn with_file(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), data.into());
        self
    }

    /// A console filesystem with `movable.sed` and the BOSS container under the id0 the
    /// key derives.
    pub fn console(key_y: &KeyY, container: Vec<u8>) -> Self {
        MemFs::default()
            .with_file(MOVABLE_SED_PATH, movable_sed(key_y))
            .with_file(container_path(&Id0::derive(key_y)), container)
    }
}

impl FileSystem for MemFs {
    fn open_file(&self, path: &str) -> AutocopyResult<Storage> {
        self.files
            .get(path)
            .map(|data| VecStorage::new(data.clone()))
            .ok_or_else(|| AutocopyError::PathNotFound(path.into()))
    }

    fn read_dir(&self, path: &str) -> AutocopyResult<Vec<String>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));

        let mut names: Vec<String> = self
            .files
            .keys()
            .filter_map(|p| p.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(String::from)
            .collect();
        names.dedup();

        if names.is_empty() {
            return Err(AutocopyError::PathNotFound(path.into()));
        }
        Ok(names)
    }
}

const TAG_LEN: usize = 0x10;

/// Mounts partitions by the tag written at their start, see [`volume`].
#[derive(Debug, Clone, Default)]
pub struct MemMount {
    filesystems: HashMap<String, MemFs>,
}

impl MemMount {
    pub fn with_fs(mut self, tag: &str, fs: MemFs) -> Self {
        self.filesystems.insert(tag.into(), fs);
        self
    }
}

impl Mount for MemMount {
    fn mount(&self, partition: Storage) -> AutocopyResult<Box<dyn FileSystem>> {
        let mut tag = [0; TAG_LEN];
        partition.read_exact_at(0, &mut tag)?;
        let tag = String::from_utf8_lossy(&tag).trim_end_matches('\0').to_string();

        self.filesystems
            .get(&tag)
            .map(|fs| Box::new(fs.clone()) as Box<dyn FileSystem>)
            .ok_or_else(|| AutocopyError::Format(format!("no filesystem tagged {tag:?}")))
    }
}

/// A volume with an MBR whose first partition starts with `tag`.
pub fn volume(tag: &str) -> Vec<u8> {
    assert!(tag.len() <= TAG_LEN);

    let mut out = vec![0; 0x200 * 3];
    // first entry: sector 1, two sectors long
    out[0x1be + 8..0x1be + 12].copy_from_slice(&1u32.to_le_bytes());
    out[0x1be + 12..0x1be + 16].copy_from_slice(&2u32.to_le_bytes());
    out[0x1fe..0x200].copy_from_slice(&[0x55, 0xaa]);
    out[0x200..0x200 + tag.len()].copy_from_slice(tag.as_bytes());
    out
}

/// Images kept in memory, keyed by their path.
#[derive(Debug, Clone, Default)]
pub struct MemImages {
    images: HashMap<PathBuf, Vec<u8>>,
}

impl MemImages {
    pub fn with_image(mut self, path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        self.images.insert(path.into(), data);
        self
    }
}

impl ImageOpener for MemImages {
    fn open_image(&self, path: &Path) -> AutocopyResult<Storage> {
        self.images
            .get(path)
            .map(|data| VecStorage::new(data.clone()))
            .ok_or_else(|| AutocopyError::PathNotFound(path.display().to_string()))
    }
}

pub fn encrypt_ctr(data: &mut [u8], key: [u8; 0x10], iv: [u8; 0x10]) {
    let mut cipher = ctr::Ctr128BE::<Aes128>::new(&key.into(), &iv.into());
    cipher.apply_keystream(data);
}

pub fn options(output_dir: &Path) -> ExtractOptions {
    ExtractOptions {
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    }
}
