//! TSDB backed by one binary ring-buffer datafile per pair.

use crate::{SqliteCatalog, StoreError, Tsdb};
use pingfleet_datafile::{Datafile, DEFAULT_MAX_RECORDS};
use pingfleet_proto::latency;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Writes go through a cache of open datafile handles, one per pair; the
/// pair registry lives in the catalog's `src_dst` table. Reads always open
/// a fresh handle so they never fight the single writer.
pub struct DatafileTsdb {
    catalog: Arc<SqliteCatalog>,
    data_dir: PathBuf,
    handles: HashMap<(String, Ipv4Addr), Datafile>,
    max_records: u64,
}

impl DatafileTsdb {
    pub fn new<P: AsRef<Path>>(
        catalog: Arc<SqliteCatalog>,
        data_dir: P,
    ) -> Result<Self, StoreError> {
        Self::with_max_records(catalog, data_dir, DEFAULT_MAX_RECORDS)
    }

    pub fn with_max_records<P: AsRef<Path>>(
        catalog: Arc<SqliteCatalog>,
        data_dir: P,
        max_records: u64,
    ) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        Ok(Self {
            catalog,
            data_dir: data_dir.as_ref().to_path_buf(),
            handles: HashMap::new(),
            max_records,
        })
    }

    /// Fetch the writer handle for a pair, creating and registering the
    /// datafile on the pair's first sample.
    fn datafile_for(
        &mut self,
        prober_name: &str,
        dst_ip: Ipv4Addr,
    ) -> Result<&mut Datafile, StoreError> {
        let key = (prober_name.to_string(), dst_ip);
        match self.handles.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let existing = self.catalog.pair_for(prober_name, dst_ip)?;
                let datafile = match existing.and_then(|pair| pair.datafile) {
                    Some(path) => Datafile::open_with_max_records(path, self.max_records)?,
                    None => {
                        let epoch = SystemTime::now()
                            .duration_since(UNIX_EPOCH)
                            .map(|d| d.as_secs())
                            .unwrap_or(0);
                        let filename = format!("{prober_name}_{dst_ip}_{epoch}.ping");
                        let path = self.data_dir.join(filename);
                        let datafile = Datafile::create(&path, self.max_records)?;
                        self.catalog.register_pair(
                            prober_name,
                            dst_ip,
                            &path.to_string_lossy(),
                        )?;
                        info!(prober = prober_name, dst = %dst_ip, path = %path.display(), "created datafile for new pair");
                        datafile
                    }
                };
                Ok(entry.insert(datafile))
            }
        }
    }

    /// A read-only handle, separate from any cached writer.
    fn reader_for(
        &self,
        prober_name: &str,
        dst_ip: Ipv4Addr,
    ) -> Result<Option<Datafile>, StoreError> {
        match self.catalog.pair_for(prober_name, dst_ip)? {
            Some(pair) => match pair.datafile {
                Some(path) => Ok(Some(Datafile::open_with_max_records(
                    path,
                    self.max_records,
                )?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }
}

impl Tsdb for DatafileTsdb {
    fn record(
        &mut self,
        prober_name: &str,
        dst_ip: Ipv4Addr,
        send_time: f64,
        receive_time: Option<f64>,
    ) -> Result<(), StoreError> {
        let encoded = latency::encode(Some(send_time), receive_time);
        let datafile = self.datafile_for(prober_name, dst_ip)?;
        datafile.append(send_time as u32, encoded)?;
        Ok(())
    }

    fn query(
        &mut self,
        prober_name: &str,
        dst_ip: Ipv4Addr,
        start: u32,
        end: u32,
    ) -> Result<Vec<(u32, Option<f64>)>, StoreError> {
        match self.reader_for(prober_name, dst_ip)? {
            Some(mut datafile) => Ok(datafile.read_range(start, end)?),
            None => Ok(Vec::new()),
        }
    }

    fn last_time(
        &mut self,
        prober_name: &str,
        dst_ip: Ipv4Addr,
    ) -> Result<Option<u32>, StoreError> {
        match self.reader_for(prober_name, dst_ip)? {
            Some(mut datafile) => Ok(datafile.read_all()?.last().map(|(epoch, _)| *epoch)),
            None => Ok(None),
        }
    }

    fn count(&mut self, prober_name: &str, dst_ip: Ipv4Addr) -> Result<u64, StoreError> {
        match self.reader_for(prober_name, dst_ip)? {
            Some(datafile) => Ok(datafile.n_records()),
            None => Ok(0),
        }
    }
}
