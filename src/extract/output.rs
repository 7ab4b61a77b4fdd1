//! Writing payloads to disk without duplicating ones that were dumped before.

use core::fmt;
use std::{
    fs,
    io::Write,
    path::PathBuf,
};

use crate::AutocopyResult;

/// MD5 of a payload. Only used to tell files apart.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(pub [u8; 0x10]);

impl Fingerprint {
    pub fn of(data: &[u8]) -> Self {
        Self(md5::compute(data).0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written {
        path: PathBuf,
        fingerprint: Fingerprint,
    },
    Duplicate {
        existing: PathBuf,
        fingerprint: Fingerprint,
    },
}

impl WriteOutcome {
    pub fn fingerprint(&self) -> Fingerprint {
        match self {
            WriteOutcome::Written { fingerprint, .. }
            | WriteOutcome::Duplicate { fingerprint, .. } => *fingerprint,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, WriteOutcome::Duplicate { .. })
    }
}

/// Splits `file.bin` into `("file", Some("bin"))`.
fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rsplit_once('.') {
        Some((name, ext)) if !name.is_empty() => (name, Some(ext)),
        _ => (file_name, None),
    }
}

#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Looks for a file with the same content as `fingerprint`. Earlier runs may have
    /// renamed `file.bin` to `file.2.bin` and so on, so every file starting with the name
    /// sans extension is a candidate.
    pub fn find_duplicate(
        &self,
        file_name: &str,
        fingerprint: Fingerprint,
    ) -> AutocopyResult<Option<PathBuf>> {
        let (prefix, _) = split_extension(file_name);

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file()
                || !entry.file_name().to_string_lossy().starts_with(prefix)
            {
                continue;
            }

            let existing = entry.path();
            if Fingerprint::of(&fs::read(&existing)?) == fingerprint {
                return Ok(Some(existing));
            }
        }

        Ok(None)
    }

    /// First of `file.bin`, `file.2.bin`, `file.3.bin`, ... that does not exist yet.
    pub fn unused_path(&self, file_name: &str) -> AutocopyResult<PathBuf> {
        let (name, ext) = split_extension(file_name);

        let mut candidate = self.dir.join(file_name);
        for number in 2.. {
            if !candidate.try_exists()? {
                break;
            }
            let numbered = match ext {
                Some(ext) => format!("{name}.{number}.{ext}"),
                None => format!("{name}.{number}"),
            };
            candidate = self.dir.join(numbered);
        }

        Ok(candidate)
    }

    /// Writes `payload` under `file_name`, or a numbered variant of it. Nothing is written
    /// if an identical file exists, unless `skip_dedup` is set.
    pub fn write(
        &self,
        file_name: &str,
        payload: &[u8],
        skip_dedup: bool,
    ) -> AutocopyResult<WriteOutcome> {
        let fingerprint = Fingerprint::of(payload);

        if !skip_dedup {
            if let Some(existing) = self.find_duplicate(file_name, fingerprint)? {
                log::info!("{file_name} ({fingerprint}) already dumped as {}", existing.display());
                return Ok(WriteOutcome::Duplicate {
                    existing,
                    fingerprint,
                });
            }
        }

        let path = self.unused_path(file_name)?;

        // a partially written payload never shows up under its final name
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(payload)?;
        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(&path).map_err(|e| e.error)?;

        log::info!("wrote {} ({fingerprint})", path.display());
        Ok(WriteOutcome::Written { path, fingerprint })
    }
}
