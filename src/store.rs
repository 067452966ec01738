use log::{debug, info};
use sled::IVec;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::key_codec;
use crate::record::ExecutionRecord;
use crate::value_codec;

/// The on-disk history. Holds the sled file lock for as long as it is open;
/// a second process opening the same path fails with [`Error::StoreLocked`].
pub struct HistoryStore {
    db: sled::Db,
    path: PathBuf,
}

fn is_lock_contention(err: &sled::Error) -> bool {
    match err {
        sled::Error::Io(io) => {
            let msg = io.to_string();
            io.kind() == ErrorKind::WouldBlock
                || msg.contains("could not acquire")
                || msg.contains("WouldBlock")
                || msg.contains("Resource temporarily unavailable")
        }
        _ => false,
    }
}

impl HistoryStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::StoreOpen {
                    path: path.to_path_buf(),
                    source: sled::Error::Io(e),
                })?;
            }
        }

        // No background flusher: every operation flushes before close.
        let db = sled::Config::new()
            .path(path)
            .flush_every_ms(None)
            .open()
            .map_err(|source| {
                if is_lock_contention(&source) {
                    Error::StoreLocked(path.to_path_buf())
                } else {
                    Error::StoreOpen {
                        path: path.to_path_buf(),
                        source,
                    }
                }
            })?;

        debug!("opened history store at {}", path.display());
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one record. A record with the same millisecond and grouping key
    /// replaces the previous one.
    pub fn append(&self, record: &ExecutionRecord) -> Result<()> {
        let key = key_codec::encode_key(record.start, &record.grouping_key);
        let value = value_codec::encode_value(record)?;
        self.db.insert(key, value)?;
        info!("stored record for {:?}", record.grouping_key);
        Ok(())
    }

    /// Raw entries with `lower <= key < upper`, in key order.
    pub fn range(
        &self,
        lower: Vec<u8>,
        upper: Vec<u8>,
    ) -> Box<dyn Iterator<Item = Result<(IVec, IVec)>> + '_> {
        if lower >= upper {
            return Box::new(std::iter::empty());
        }
        Box::new(self.db.range(lower..upper).map(|r| r.map_err(Error::from)))
    }

    /// Every raw entry, in key order.
    pub fn entries(&self) -> Box<dyn Iterator<Item = Result<(IVec, IVec)>> + '_> {
        Box::new(self.db.iter().map(|r| r.map_err(Error::from)))
    }

    /// Raw put, bypassing the codecs.
    #[cfg(test)]
    pub fn insert_raw(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    /// Flushes pending writes and releases the store. Dropping the store
    /// without calling this still releases the lock.
    pub fn close(self) -> Result<()> {
        self.db.flush()?;
        debug!("closed history store at {}", self.path.display());
        Ok(())
    }
}
