use super::{IStorage, Storage};
use crate::AutocopyResult;

use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug)]
pub struct FileStorage {
    fp: Mutex<File>,
}

impl FileStorage {
    pub fn new(fp: File) -> Storage {
        Storage::new(Self { fp: Mutex::new(fp) })
    }

    pub fn open(path: impl AsRef<Path>) -> io::Result<Storage> {
        File::open(path).map(Self::new)
    }
}

impl IStorage for FileStorage {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> AutocopyResult<u64> {
        let mut fp = self.fp.lock();

        fp.seek(SeekFrom::Start(offset))?;

        // a single read may come back short on some platforms, keep going until EOF
        let mut cnt = 0;
        while cnt < buf.len() {
            match fp.read(&mut buf[cnt..])? {
                0 => break,
                n => cnt += n,
            }
        }

        Ok(cnt as _)
    }

    fn length(&self) -> AutocopyResult<u64> {
        Ok(self.fp.lock().metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::FileStorage;
    use crate::{storage::IStorage, AutocopyResult};
    use std::io::Write;

    #[test]
    fn reads_from_offsets() -> AutocopyResult<()> {
        let mut fp = tempfile::tempfile()?;
        fp.write_all(b"0123456789")?;

        let storage = FileStorage::new(fp);
        assert_eq!(storage.length()?, 10);

        let mut buf = [0; 4];
        assert_eq!(storage.read_at(3, &mut buf)?, 4);
        assert_eq!(&buf, b"3456");

        assert_eq!(storage.read_at(8, &mut buf)?, 2);
        assert_eq!(&buf[..2], b"89");

        Ok(())
    }
}
