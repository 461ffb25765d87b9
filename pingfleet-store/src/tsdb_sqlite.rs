//! TSDB backed by a single SQLite samples table.

use crate::{StoreError, Tsdb};
use pingfleet_proto::latency;
use rusqlite::{params, Connection, OptionalExtension};
use std::net::Ipv4Addr;
use std::path::Path;

const CREATE_SAMPLES: &str = "
    CREATE TABLE IF NOT EXISTS samples (
        prober_name TEXT NOT NULL,
        dst_ip TEXT NOT NULL,
        send_time INTEGER NOT NULL,
        latency INTEGER NOT NULL,
        PRIMARY KEY (prober_name, dst_ip, send_time)
    );
";

/// Samples keyed by `(prober_name, dst_ip, send_time)`. `INSERT OR REPLACE`
/// on the primary key makes retransmitted batches idempotent.
pub struct SqliteTsdb {
    conn: Connection,
}

impl SqliteTsdb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_SAMPLES)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_SAMPLES)?;
        Ok(Self { conn })
    }
}

impl Tsdb for SqliteTsdb {
    fn record(
        &mut self,
        prober_name: &str,
        dst_ip: Ipv4Addr,
        send_time: f64,
        receive_time: Option<f64>,
    ) -> Result<(), StoreError> {
        let encoded = latency::encode(Some(send_time), receive_time);
        self.conn.execute(
            "INSERT OR REPLACE INTO samples (prober_name, dst_ip, send_time, latency)
             VALUES (?1, ?2, ?3, ?4)",
            params![prober_name, dst_ip.to_string(), send_time as i64, encoded],
        )?;
        Ok(())
    }

    fn query(
        &mut self,
        prober_name: &str,
        dst_ip: Ipv4Addr,
        start: u32,
        end: u32,
    ) -> Result<Vec<(u32, Option<f64>)>, StoreError> {
        let mut statement = self.conn.prepare(
            "SELECT send_time, latency FROM samples
             WHERE prober_name = ?1 AND dst_ip = ?2 AND send_time >= ?3 AND send_time <= ?4
             ORDER BY send_time",
        )?;
        let rows = statement.query_map(
            params![prober_name, dst_ip.to_string(), start, end],
            |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u16>(1)?)),
        )?;
        let mut samples = Vec::new();
        for row in rows {
            let (epoch, encoded) = row?;
            samples.push((epoch, latency::decode(encoded)));
        }
        Ok(samples)
    }

    fn last_time(
        &mut self,
        prober_name: &str,
        dst_ip: Ipv4Addr,
    ) -> Result<Option<u32>, StoreError> {
        let last = self
            .conn
            .query_row(
                "SELECT MAX(send_time) FROM samples WHERE prober_name = ?1 AND dst_ip = ?2",
                params![prober_name, dst_ip.to_string()],
                |row| row.get::<_, Option<u32>>(0),
            )
            .optional()?;
        Ok(last.flatten())
    }

    fn count(&mut self, prober_name: &str, dst_ip: Ipv4Addr) -> Result<u64, StoreError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM samples WHERE prober_name = ?1 AND dst_ip = ?2",
            params![prober_name, dst_ip.to_string()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count as u64)
    }
}
