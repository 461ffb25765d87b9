//! SQLite-backed catalog and control queue.

use crate::{schema, Catalog, ControlQueue, Pair, StoreError};
use pingfleet_proto::{ControlKind, ControlMessage, ProbeKind, Prober, Target};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn parse_ip(text: &str) -> Result<Ipv4Addr, StoreError> {
    text.parse()
        .map_err(|_| StoreError::BadAddress(text.to_string()))
}

fn control_kind_from_i64(value: i64) -> Result<ControlKind, StoreError> {
    match value {
        1 => Ok(ControlKind::ReloadSettings),
        2 => Ok(ControlKind::NotifyProbers),
        other => Err(StoreError::UnknownControlKind(other)),
    }
}

fn control_kind_to_i64(kind: ControlKind) -> i64 {
    match kind {
        ControlKind::ReloadSettings => 1,
        ControlKind::NotifyProbers => 2,
    }
}

fn target_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, Option<String>, String, Option<u16>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

/// The relational catalog in a single SQLite file, shared by the collector
/// and the management tooling.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(schema::CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn add_prober(&self, name: &str, key: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO prober (name, key, added) VALUES (?1, ?2, ?3)",
            params![name, key, unix_now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn add_target(
        &self,
        name: &str,
        ip: Ipv4Addr,
        port: Option<u16>,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO target (name, ip, type, port, added) VALUES (?1, ?2, 'icmp', ?3, ?4)",
            params![name, ip.to_string(), port, unix_now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn add_probe_group(&self, name: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("INSERT INTO probe_group (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn add_prober_to_group(&self, group_id: i64, prober_id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO probe_group_probers (group_id, prober_id) VALUES (?1, ?2)",
            params![group_id, prober_id],
        )?;
        Ok(())
    }

    pub fn add_target_to_group(&self, group_id: i64, target_id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO probe_group_targets (group_id, target_id) VALUES (?1, ?2)",
            params![group_id, target_id],
        )?;
        Ok(())
    }

    /// Look up one registered pair, if any.
    pub fn pair_for(&self, prober_name: &str, dst: Ipv4Addr) -> Result<Option<Pair>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, datafile FROM src_dst WHERE prober_name = ?1 AND dst = ?2",
                params![prober_name, dst.to_string()],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(id, datafile)| Pair {
            id,
            prober_name: prober_name.to_string(),
            dst_ip: dst,
            datafile,
        }))
    }

    /// Register a new pair, recording where its datafile lives.
    pub fn register_pair(
        &self,
        prober_name: &str,
        dst: Ipv4Addr,
        datafile: &str,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO src_dst (prober_name, dst, datafile) VALUES (?1, ?2, ?3)",
            params![prober_name, dst.to_string(), datafile],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

impl Catalog for SqliteCatalog {
    fn get_prober(&self, name: &str) -> Result<Option<Prober>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let prober = conn
            .query_row(
                "SELECT id, name, key, added FROM prober WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Prober {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        key: row.get(2)?,
                        added: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(prober)
    }

    fn targets_for(&self, prober_name: &str) -> Result<Vec<Target>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut statement = conn.prepare(
            "SELECT DISTINCT t.id, t.name, t.description, t.ip, t.port
             FROM target t
             JOIN probe_group_targets gt ON gt.target_id = t.id
             JOIN probe_group_probers gp ON gp.group_id = gt.group_id
             JOIN prober p ON p.id = gp.prober_id
             WHERE p.name = ?1
             ORDER BY t.id",
        )?;
        let rows = statement.query_map(params![prober_name], target_from_row)?;
        let mut targets = Vec::new();
        for row in rows {
            let (id, name, description, ip, port) = row?;
            targets.push(Target {
                id,
                name,
                description,
                ip: parse_ip(&ip)?,
                kind: ProbeKind::Icmp,
                port,
            });
        }
        Ok(targets)
    }

    fn pairs(&self) -> Result<Vec<Pair>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut statement =
            conn.prepare("SELECT id, prober_name, dst, datafile FROM src_dst ORDER BY id")?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;
        let mut pairs = Vec::new();
        for row in rows {
            let (id, prober_name, dst, datafile) = row?;
            pairs.push(Pair {
                id,
                prober_name,
                dst_ip: parse_ip(&dst)?,
                datafile,
            });
        }
        Ok(pairs)
    }
}

impl ControlQueue for SqliteCatalog {
    fn get_unread(&self) -> Result<Vec<ControlMessage>, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut messages = Vec::new();
        {
            let mut statement = tx.prepare(
                "SELECT id, message, posted FROM message_queue WHERE read = 0 ORDER BY id",
            )?;
            let rows = statement.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;
            for row in rows {
                let (id, kind, posted) = row?;
                match control_kind_from_i64(kind) {
                    Ok(kind) => messages.push(ControlMessage { id, kind, posted }),
                    // Unknown kinds are consumed but not dispatched.
                    Err(e) => warn!(id, error = %e, "skipping control message"),
                }
            }
        }
        tx.execute("UPDATE message_queue SET read = 1 WHERE read = 0", [])?;
        tx.commit()?;
        Ok(messages)
    }

    fn post(&self, kind: ControlKind) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO message_queue (message, posted) VALUES (?1, ?2)",
            params![control_kind_to_i64(kind), unix_now()],
        )?;
        Ok(())
    }
}
