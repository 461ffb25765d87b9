use pingfleet_datafile::{Datafile, HEADER_LEN, RECORD_LEN};
use proptest::prelude::*;
use tempfile::TempDir;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After N appends into a capacity-M ring the header lands exactly where
    /// the fill/rotate phases dictate.
    #[test]
    fn test_header_evolution(appends in 0u64..200, capacity in 1u64..12) {
        let dir = TempDir::new().unwrap();
        let mut datafile = Datafile::create(dir.path().join("p.ping"), capacity).unwrap();
        for i in 0..appends {
            datafile.append(i as u32, 0).unwrap();
        }
        if appends <= capacity {
            prop_assert_eq!(datafile.n_records(), appends);
            prop_assert_eq!(datafile.offset(), HEADER_LEN);
        } else {
            prop_assert_eq!(datafile.n_records(), capacity);
            let expected = HEADER_LEN + ((appends - capacity) % capacity) * RECORD_LEN;
            prop_assert_eq!(datafile.offset(), expected);
        }
    }

    /// Reads always return the most recent min(N, M) epochs in write order.
    #[test]
    fn test_read_returns_newest_in_order(appends in 1u64..200, capacity in 1u64..12) {
        let dir = TempDir::new().unwrap();
        let mut datafile = Datafile::create(dir.path().join("p.ping"), capacity).unwrap();
        for i in 0..appends {
            datafile.append(i as u32, 0).unwrap();
        }
        let kept = appends.min(capacity);
        let epochs: Vec<u32> = datafile.read_all().unwrap().iter().map(|r| r.0).collect();
        let expected: Vec<u32> = ((appends - kept)..appends).map(|i| i as u32).collect();
        prop_assert_eq!(epochs, expected);
    }
}
