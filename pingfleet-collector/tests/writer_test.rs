use pingfleet_collector::Writer;
use pingfleet_proto::Output;
use pingfleet_store::{StoreError, Tsdb};
use std::net::Ipv4Addr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

type Recorded = (String, Ipv4Addr, f64, Option<f64>);

/// Records every successful write; fails the first `failures` attempts.
struct FlakyTsdb {
    samples: Arc<Mutex<Vec<Recorded>>>,
    failures: usize,
    attempts: usize,
}

impl Tsdb for FlakyTsdb {
    fn record(
        &mut self,
        prober_name: &str,
        dst_ip: Ipv4Addr,
        send_time: f64,
        receive_time: Option<f64>,
    ) -> Result<(), StoreError> {
        self.attempts += 1;
        if self.attempts <= self.failures {
            return Err(StoreError::BadAddress("injected failure".into()));
        }
        self.samples.lock().unwrap().push((
            prober_name.to_string(),
            dst_ip,
            send_time,
            receive_time,
        ));
        Ok(())
    }

    fn query(
        &mut self,
        _: &str,
        _: Ipv4Addr,
        _: u32,
        _: u32,
    ) -> Result<Vec<(u32, Option<f64>)>, StoreError> {
        Ok(Vec::new())
    }

    fn last_time(&mut self, _: &str, _: Ipv4Addr) -> Result<Option<u32>, StoreError> {
        Ok(None)
    }

    fn count(&mut self, _: &str, _: Ipv4Addr) -> Result<u64, StoreError> {
        Ok(0)
    }
}

fn decorated_output(send_time: f64, replies: Vec<(Ipv4Addr, Option<f64>)>) -> Output {
    Output {
        id: Some(1),
        send_time,
        replies,
        message_transmit_time: send_time,
        remote_ip: Some("127.0.0.1".into()),
        prober_name: Some("probe-nyc".into()),
    }
}

fn run_writer(tsdb: FlakyTsdb, messages: Vec<Output>) -> Arc<Mutex<Vec<Recorded>>> {
    let samples = tsdb.samples.clone();
    let (tx, rx) = std::sync::mpsc::channel();
    let stop = Arc::new(AtomicBool::new(false));
    let writer = Writer::new(Box::new(tsdb), rx, stop);
    let thread = std::thread::spawn(move || writer.run());
    for message in messages {
        tx.send(message).unwrap();
    }
    // Dropping the sender ends the drain loop once the queue is empty.
    drop(tx);
    thread.join().unwrap();
    samples
}

/// One batch expands to one TSDB write per reply.
#[test]
fn test_batch_expands_to_per_reply_writes() {
    let tsdb = FlakyTsdb {
        samples: Arc::new(Mutex::new(Vec::new())),
        failures: 0,
        attempts: 0,
    };
    let a = Ipv4Addr::new(10, 0, 0, 1);
    let b = Ipv4Addr::new(10, 0, 0, 255);
    let samples = run_writer(
        tsdb,
        vec![decorated_output(
            1000.0,
            vec![(a, Some(1000.0123)), (b, None)],
        )],
    );

    let samples = samples.lock().unwrap();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0], ("probe-nyc".into(), a, 1000.0, Some(1000.0123)));
    assert_eq!(samples[1], ("probe-nyc".into(), b, 1000.0, None));
}

/// A transient failure is retried once and the sample still lands.
#[test]
fn test_failed_write_is_retried_once() {
    let tsdb = FlakyTsdb {
        samples: Arc::new(Mutex::new(Vec::new())),
        failures: 1,
        attempts: 0,
    };
    let dst = Ipv4Addr::new(10, 0, 0, 1);
    let samples = run_writer(
        tsdb,
        vec![decorated_output(1000.0, vec![(dst, Some(1000.1))])],
    );
    assert_eq!(samples.lock().unwrap().len(), 1);
}

/// Two consecutive failures drop the sample but never kill the writer.
#[test]
fn test_double_failure_drops_sample_only() {
    let tsdb = FlakyTsdb {
        samples: Arc::new(Mutex::new(Vec::new())),
        failures: 2,
        attempts: 0,
    };
    let a = Ipv4Addr::new(10, 0, 0, 1);
    let b = Ipv4Addr::new(10, 0, 0, 2);
    let samples = run_writer(
        tsdb,
        vec![decorated_output(1000.0, vec![(a, None), (b, Some(1000.2))])],
    );

    let samples = samples.lock().unwrap();
    // The first reply burned both attempts; the second still lands.
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].1, b);
}

/// A message that somehow lost its decoration is skipped.
#[test]
fn test_undecorated_message_is_skipped() {
    let tsdb = FlakyTsdb {
        samples: Arc::new(Mutex::new(Vec::new())),
        failures: 0,
        attempts: 0,
    };
    let mut message = decorated_output(1000.0, vec![(Ipv4Addr::new(10, 0, 0, 1), None)]);
    message.prober_name = None;
    let samples = run_writer(tsdb, vec![message]);
    assert!(samples.lock().unwrap().is_empty());
}
