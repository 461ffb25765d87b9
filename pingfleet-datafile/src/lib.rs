//! # Pingfleet Datafile
//!
//! A fixed-size binary ring buffer holding one `(prober, destination)`
//! pair's latency history.
//!
//! ## File format
//!
//! ```text
//! Header (24 bytes, little-endian):
//!   [0..4)   magic  "PING"
//!   [4]      version (currently 3)
//!   [5]      data_length (currently 2)
//!   [6..8)   reserved, zero
//!   [8..16)  offset      byte offset of the oldest record
//!   [16..24) n_records   current count of valid records
//! Record (6 bytes):
//!   [0..4)   epoch    u32 UNIX seconds
//!   [4..6)   latency  u16, see pingfleet_proto::latency
//! ```
//!
//! The data region `[24, file_size)` fills sequentially until it holds
//! `max_records` entries, then rotates: each further append overwrites the
//! oldest record and advances `offset` one record, wrapping at the end of
//! the file. While filling, only `n_records` changes; once saturated, only
//! `offset` does.

use byteorder::{ByteOrder, LittleEndian};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const MAGIC: &[u8; 4] = b"PING";
pub const VERSION: u8 = 3;
pub const DATA_LENGTH: u8 = 2;
pub const HEADER_LEN: u64 = 24;
pub const RECORD_LEN: u64 = 4 + DATA_LENGTH as u64;
/// One week of one-second samples.
pub const DEFAULT_MAX_RECORDS: u64 = 86400 * 7;

#[derive(Debug, Error)]
pub enum DatafileError {
    #[error("file too short to hold a datafile header")]
    ShortFile,
    #[error("bad magic bytes, not a datafile")]
    BadMagic,
    #[error("unsupported datafile version {0}")]
    UnsupportedVersion(u8),
    #[error("unsupported record data length {0}")]
    UnsupportedDataLength(u8),
    #[error("{0} records exceed ring capacity {1}")]
    TooManyRecords(usize, u64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The mutable half of the on-disk header.
///
/// `offset` and `n_records` evolve in two disjoint phases: while filling,
/// `offset` stays at [`HEADER_LEN`] and `n_records` grows; once saturated,
/// `n_records` is pinned at capacity and `offset` rotates through the data
/// region. Exactly one of the two fields changes per append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    version: u8,
    data_length: u8,
    offset: u64,
    n_records: u64,
}

impl Header {
    fn parse(buf: &[u8; HEADER_LEN as usize]) -> Result<Self, DatafileError> {
        if &buf[0..4] != MAGIC {
            return Err(DatafileError::BadMagic);
        }
        let version = buf[4];
        if version != VERSION {
            return Err(DatafileError::UnsupportedVersion(version));
        }
        let data_length = buf[5];
        if data_length != DATA_LENGTH {
            return Err(DatafileError::UnsupportedDataLength(data_length));
        }
        Ok(Self {
            version,
            data_length,
            offset: LittleEndian::read_u64(&buf[8..16]),
            n_records: LittleEndian::read_u64(&buf[16..24]),
        })
    }

    fn to_bytes(self) -> [u8; HEADER_LEN as usize] {
        let mut buf = [0u8; HEADER_LEN as usize];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version;
        buf[5] = self.data_length;
        LittleEndian::write_u64(&mut buf[8..16], self.offset);
        LittleEndian::write_u64(&mut buf[16..24], self.n_records);
        buf
    }
}

/// One open ring-buffer datafile.
///
/// A datafile has exactly one writer; concurrent readers must open their
/// own handle.
pub struct Datafile {
    file: std::fs::File,
    path: PathBuf,
    header: Header,
    max_records: u64,
}

impl Datafile {
    /// Create (or truncate) a datafile sized for `max_records` entries.
    pub fn create<P: AsRef<Path>>(path: P, max_records: u64) -> Result<Self, DatafileError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        let mut datafile = Self {
            file,
            path: path.as_ref().to_path_buf(),
            header: Header {
                version: VERSION,
                data_length: DATA_LENGTH,
                offset: HEADER_LEN,
                n_records: 0,
            },
            max_records,
        };
        datafile.write_header()?;
        debug!(path = %datafile.path.display(), max_records, "created datafile");
        Ok(datafile)
    }

    /// Open an existing datafile with the default ring capacity.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatafileError> {
        Self::open_with_max_records(path, DEFAULT_MAX_RECORDS)
    }

    /// Open an existing datafile, validating its header. `max_records` is a
    /// caller contract and must match the capacity the file was created
    /// with; the header is trusted only for `offset` and `n_records`.
    pub fn open_with_max_records<P: AsRef<Path>>(
        path: P,
        max_records: u64,
    ) -> Result<Self, DatafileError> {
        let mut file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let mut buf = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                DatafileError::ShortFile
            } else {
                DatafileError::Io(e)
            }
        })?;
        let header = Header::parse(&buf)?;
        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            header,
            max_records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.header.offset
    }

    pub fn n_records(&self) -> u64 {
        self.header.n_records
    }

    pub fn max_records(&self) -> u64 {
        self.max_records
    }

    pub fn version(&self) -> u8 {
        self.header.version
    }

    /// Total byte size of a full file: header plus data region.
    pub fn file_size(&self) -> u64 {
        HEADER_LEN + self.max_records * RECORD_LEN
    }

    fn write_header(&mut self) -> Result<(), DatafileError> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.to_bytes())?;
        Ok(())
    }

    fn write_offset(&mut self) -> Result<(), DatafileError> {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, self.header.offset);
        self.file.seek(SeekFrom::Start(8))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    fn write_n_records(&mut self) -> Result<(), DatafileError> {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, self.header.n_records);
        self.file.seek(SeekFrom::Start(16))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    /// Append one record, overwriting the oldest once the ring is full.
    pub fn append(&mut self, epoch: u32, latency: u16) -> Result<(), DatafileError> {
        let mut position = self.header.offset + self.header.n_records * RECORD_LEN;
        if position >= self.file_size() {
            position -= self.max_records * RECORD_LEN;
        }
        let mut record = [0u8; RECORD_LEN as usize];
        LittleEndian::write_u32(&mut record[0..4], epoch);
        LittleEndian::write_u16(&mut record[4..6], latency);
        self.file.seek(SeekFrom::Start(position))?;
        self.file.write_all(&record)?;

        if self.header.n_records < self.max_records {
            self.header.n_records += 1;
            self.write_n_records()?;
        } else {
            self.header.offset += RECORD_LEN;
            if self.header.offset >= self.file_size() {
                self.header.offset = HEADER_LEN;
            }
            self.write_offset()?;
        }
        self.file.flush()?;
        Ok(())
    }

    /// Read every valid record in write order, decoding latencies.
    pub fn read_all(&mut self) -> Result<Vec<(u32, Option<f64>)>, DatafileError> {
        let mut records = Vec::with_capacity(self.header.n_records as usize);
        self.file.seek(SeekFrom::Start(self.header.offset))?;
        for _ in 0..self.header.n_records {
            if self.file.stream_position()? >= self.file_size() {
                self.file.seek(SeekFrom::Start(HEADER_LEN))?;
            }
            let mut record = [0u8; RECORD_LEN as usize];
            self.file.read_exact(&mut record)?;
            let epoch = LittleEndian::read_u32(&record[0..4]);
            let latency = pingfleet_proto::latency::decode(LittleEndian::read_u16(&record[4..6]));
            records.push((epoch, latency));
        }
        debug!(count = records.len(), path = %self.path.display(), "read records");
        Ok(records)
    }

    /// Read records with `start <= epoch <= end`, in write order.
    pub fn read_range(
        &mut self,
        start: u32,
        end: u32,
    ) -> Result<Vec<(u32, Option<f64>)>, DatafileError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|(epoch, _)| (start..=end).contains(epoch))
            .collect())
    }

    /// Atomically re-populate the file with the given records, resetting the
    /// ring to the fill phase. Used by repair tooling.
    pub fn overwrite_all(&mut self, records: &[(u32, u16)]) -> Result<(), DatafileError> {
        if records.len() as u64 > self.max_records {
            return Err(DatafileError::TooManyRecords(
                records.len(),
                self.max_records,
            ));
        }
        self.file.set_len(HEADER_LEN)?;
        self.file.seek(SeekFrom::Start(HEADER_LEN))?;
        for (epoch, latency) in records {
            let mut record = [0u8; RECORD_LEN as usize];
            LittleEndian::write_u32(&mut record[0..4], *epoch);
            LittleEndian::write_u16(&mut record[4..6], *latency);
            self.file.write_all(&record)?;
        }
        self.header.offset = HEADER_LEN;
        self.header.n_records = records.len() as u64;
        self.write_header()?;
        self.file.flush()?;
        Ok(())
    }
}
