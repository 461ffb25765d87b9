use pingfleet_datafile::{Datafile, DatafileError, HEADER_LEN, RECORD_LEN};
use std::io::Write;
use tempfile::TempDir;

fn scratch() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pair.ping");
    (dir, path)
}

#[test]
fn test_create_writes_empty_header() {
    let (_dir, path) = scratch();
    let datafile = Datafile::create(&path, 100).unwrap();
    assert_eq!(datafile.offset(), HEADER_LEN);
    assert_eq!(datafile.n_records(), 0);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), HEADER_LEN);
}

#[test]
fn test_fill_phase_grows_count_only() {
    let (_dir, path) = scratch();
    let mut datafile = Datafile::create(&path, 10).unwrap();
    for i in 0..7u32 {
        datafile.append(1000 + i, i as u16).unwrap();
        assert_eq!(datafile.n_records(), u64::from(i) + 1);
        assert_eq!(datafile.offset(), HEADER_LEN);
    }
}

#[test]
fn test_reopen_preserves_header() {
    let (_dir, path) = scratch();
    {
        let mut datafile = Datafile::create(&path, 5).unwrap();
        for i in 0..3u32 {
            datafile.append(100 + i, 10).unwrap();
        }
    }
    let mut reopened = Datafile::open_with_max_records(&path, 5).unwrap();
    assert_eq!(reopened.n_records(), 3);
    assert_eq!(reopened.offset(), HEADER_LEN);
    let records = reopened.read_all().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].0, 100);
    assert_eq!(records[2].0, 102);
}

/// The saturating append fills the last slot without moving the offset; the
/// one after it is the first to rotate.
#[test]
fn test_saturating_append_boundary() {
    let (_dir, path) = scratch();
    let mut datafile = Datafile::create(&path, 3).unwrap();
    for i in 0..3u32 {
        datafile.append(i, 0).unwrap();
    }
    assert_eq!(datafile.n_records(), 3);
    assert_eq!(datafile.offset(), HEADER_LEN);

    datafile.append(3, 0).unwrap();
    assert_eq!(datafile.n_records(), 3);
    assert_eq!(datafile.offset(), HEADER_LEN + RECORD_LEN);
}

/// The literal wrap scenario: capacity 3, five appends.
#[test]
fn test_ring_wrap_scenario() {
    let (_dir, path) = scratch();
    let mut datafile = Datafile::create(&path, 3).unwrap();
    for (epoch, latency) in [(100, 0), (101, 655), (102, 32767), (103, 65534), (104, 65535)] {
        datafile.append(epoch, latency).unwrap();
    }
    assert_eq!(datafile.n_records(), 3);
    assert_eq!(datafile.offset(), 24 + 2 * RECORD_LEN);

    let records = datafile.read_all().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0], (102, Some(0.5)));
    assert_eq!(records[1], (103, Some(1.0)));
    assert_eq!(records[2], (104, None));
}

#[test]
fn test_offset_wraps_back_to_header() {
    let (_dir, path) = scratch();
    let mut datafile = Datafile::create(&path, 3).unwrap();
    // 10 appends: offset = 24 + ((10 - 3) mod 3) * 6 = 30.
    for i in 0..10u32 {
        datafile.append(i, 0).unwrap();
    }
    assert_eq!(datafile.n_records(), 3);
    assert_eq!(datafile.offset(), HEADER_LEN + RECORD_LEN);
    let epochs: Vec<u32> = datafile.read_all().unwrap().iter().map(|r| r.0).collect();
    assert_eq!(epochs, vec![7, 8, 9]);
}

#[test]
fn test_read_range_is_inclusive() {
    let (_dir, path) = scratch();
    let mut datafile = Datafile::create(&path, 10).unwrap();
    for epoch in [100u32, 101, 102, 103, 104] {
        datafile.append(epoch, 1).unwrap();
    }
    let records = datafile.read_range(101, 103).unwrap();
    let epochs: Vec<u32> = records.iter().map(|r| r.0).collect();
    assert_eq!(epochs, vec![101, 102, 103]);

    assert!(datafile.read_range(200, 300).unwrap().is_empty());
    assert!(datafile.read_range(0, 99).unwrap().is_empty());
}

#[test]
fn test_overwrite_all_resets_ring() {
    let (_dir, path) = scratch();
    let mut datafile = Datafile::create(&path, 4).unwrap();
    for i in 0..9u32 {
        datafile.append(i, 7).unwrap();
    }
    assert_ne!(datafile.offset(), HEADER_LEN);

    datafile.overwrite_all(&[(50, 100), (51, 65535)]).unwrap();
    assert_eq!(datafile.offset(), HEADER_LEN);
    assert_eq!(datafile.n_records(), 2);
    let records = datafile.read_all().unwrap();
    assert_eq!(records[0].0, 50);
    assert_eq!(records[1], (51, None));
}

#[test]
fn test_overwrite_all_rejects_overflow() {
    let (_dir, path) = scratch();
    let mut datafile = Datafile::create(&path, 2).unwrap();
    let result = datafile.overwrite_all(&[(1, 0), (2, 0), (3, 0)]);
    assert!(matches!(result, Err(DatafileError::TooManyRecords(3, 2))));
}

#[test]
fn test_open_rejects_bad_magic() {
    let (_dir, path) = scratch();
    std::fs::write(&path, b"GNIPxxxxxxxxxxxxxxxxxxxx").unwrap();
    assert!(matches!(
        Datafile::open(&path),
        Err(DatafileError::BadMagic)
    ));
}

#[test]
fn test_open_rejects_short_file() {
    let (_dir, path) = scratch();
    std::fs::write(&path, b"PING").unwrap();
    assert!(matches!(
        Datafile::open(&path),
        Err(DatafileError::ShortFile)
    ));
}

#[test]
fn test_open_rejects_unknown_version() {
    let (_dir, path) = scratch();
    Datafile::create(&path, 3).unwrap();
    let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    use std::io::Seek;
    file.seek(std::io::SeekFrom::Start(4)).unwrap();
    file.write_all(&[9]).unwrap();
    drop(file);
    assert!(matches!(
        Datafile::open(&path),
        Err(DatafileError::UnsupportedVersion(9))
    ));
}
