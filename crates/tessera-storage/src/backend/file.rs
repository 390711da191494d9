use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tessera_core::{serialize, Block};

use super::BlockBackend;
use crate::error::StorageError;

const LEN_PREFIX: usize = 4;

/// Append-only log of stored blocks.
///
/// Every `store_block` adds one record: a little-endian `u32` length
/// followed by the bincode encoding of the block. Replaying the log in
/// order rebuilds the store, overwrites included. A record cut short by a
/// crash is dropped from the file on load.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileBackend { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn truncate(&self, len: usize) -> Result<(), StorageError> {
        OpenOptions::new()
            .write(true)
            .open(&self.path)
            .and_then(|file| file.set_len(len as u64))
            .map_err(io_error)
    }
}

fn io_error(error: std::io::Error) -> StorageError {
    StorageError::Io(error.to_string())
}

impl BlockBackend for FileBackend {
    fn load(&self) -> Result<Vec<Block>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(e)),
        };

        let mut blocks = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let rest = &bytes[offset..];
            let Some(prefix) = rest.get(..LEN_PREFIX) else {
                break;
            };
            let mut len = [0u8; LEN_PREFIX];
            len.copy_from_slice(prefix);
            let len = u32::from_le_bytes(len) as usize;
            let Some(record) = rest.get(LEN_PREFIX..LEN_PREFIX + len) else {
                break;
            };
            let block = serialize::from_bytes(record)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            blocks.push(block);
            offset += LEN_PREFIX + len;
        }

        if offset < bytes.len() {
            self.truncate(offset)?;
        }
        Ok(blocks)
    }

    fn append(&mut self, block: &Block) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let encoded =
            serialize::to_bytes(block).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let len = u32::try_from(encoded.len())
            .map_err(|_| StorageError::Serialization("block record too large".to_string()))?;
        let mut record = Vec::with_capacity(LEN_PREFIX + encoded.len());
        record.extend_from_slice(&len.to_le_bytes());
        record.extend_from_slice(&encoded);

        let mut file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        file.write_all(&record).map_err(io_error)?;
        file.flush().map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::Hash;

    fn block(height: u64, created_time: u64) -> Block {
        Block::new(height, Hash::ZERO, created_time, vec![]).unwrap()
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("blocks.bin"));
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn test_append_then_load_in_write_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path().join("nested").join("blocks.bin"));

        backend.append(&block(2, 20)).unwrap();
        backend.append(&block(1, 10)).unwrap();
        backend.append(&block(2, 21)).unwrap();

        let loaded = backend.load().unwrap();
        assert_eq!(loaded, vec![block(2, 20), block(1, 10), block(2, 21)]);
    }

    #[test]
    fn test_each_append_adds_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.bin");
        let mut backend = FileBackend::new(&path);

        backend.append(&block(1, 10)).unwrap();
        let first = fs::metadata(&path).unwrap().len();
        backend.append(&block(2, 20)).unwrap();
        let second = fs::metadata(&path).unwrap().len();

        // the second write does not rewrite the first record
        assert_eq!(second, 2 * first);
    }

    #[test]
    fn test_torn_tail_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.bin");
        let mut backend = FileBackend::new(&path);
        backend.append(&block(1, 10)).unwrap();
        let intact = fs::metadata(&path).unwrap().len();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0x40, 0, 0, 0, 1, 2]).unwrap();
        drop(file);

        assert_eq!(backend.load().unwrap(), vec![block(1, 10)]);
        assert_eq!(fs::metadata(&path).unwrap().len(), intact);

        backend.append(&block(2, 20)).unwrap();
        assert_eq!(backend.load().unwrap(), vec![block(1, 10), block(2, 20)]);
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.bin");
        fs::write(&path, [2u8, 0, 0, 0, 0xff, 0xff]).unwrap();
        assert!(matches!(
            FileBackend::new(path).load(),
            Err(StorageError::Serialization(_))
        ));
    }
}
