use pingfleet_prober::uplink::{Uplink, MESSAGE_ACK_TIMEOUT};
use pingfleet_proto::{ManualClock, Output};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn batch(send_time: f64) -> Output {
    Output {
        id: None,
        send_time,
        replies: vec![(Ipv4Addr::new(10, 0, 0, 1), Some(send_time + 0.01))],
        message_transmit_time: 0.0,
        remote_ip: None,
        prober_name: None,
    }
}

fn uplink_at(first_nonce: u64) -> (Arc<ManualClock>, Uplink) {
    let clock = Arc::new(ManualClock::new(Instant::now(), 1000.0));
    let uplink = Uplink::with_nonce(clock.clone(), first_nonce);
    (clock, uplink)
}

#[test]
fn test_nonces_are_monotonic() {
    let (_clock, mut uplink) = uplink_at(700);
    let first = uplink.prepare_transmit(batch(1.0));
    let second = uplink.prepare_transmit(batch(2.0));
    assert_eq!(first.id, Some(700));
    assert_eq!(second.id, Some(701));
    assert_eq!(uplink.unconfirmed_len(), 2);
}

#[test]
fn test_random_start_fits_in_40_bits() {
    let clock = Arc::new(ManualClock::new(Instant::now(), 0.0));
    for _ in 0..16 {
        let uplink = Uplink::new(clock.clone());
        assert!(uplink.next_nonce() < 1u64 << 40);
    }
}

#[test]
fn test_ack_removes_matching_entry() {
    let (_clock, mut uplink) = uplink_at(7);
    let sent = uplink.prepare_transmit(batch(1.0));
    assert_eq!(uplink.on_ack(sent.id.unwrap()), 1);
    assert_eq!(uplink.unconfirmed_len(), 0);
    // A second ACK for the same id is a no-op.
    assert_eq!(uplink.on_ack(sent.id.unwrap()), 0);
}

#[test]
fn test_unknown_ack_is_ignored() {
    let (_clock, mut uplink) = uplink_at(7);
    uplink.prepare_transmit(batch(1.0));
    assert_eq!(uplink.on_ack(9999), 0);
    assert_eq!(uplink.unconfirmed_len(), 1);
}

/// The ACK/retransmit scenario: batch id 7 sent at t=0, silent for 5 s,
/// requeued, resent with the same id and a fresh transmit time, then ACKed.
#[test]
fn test_requeue_after_ack_timeout() {
    let (clock, mut uplink) = uplink_at(7);
    let sent = uplink.prepare_transmit(batch(1000.0));
    assert_eq!(sent.id, Some(7));
    let first_transmit_time = sent.message_transmit_time;

    // Nothing to requeue before the timeout.
    clock.advance(Duration::from_millis(4900));
    assert!(uplink.requeue_expired().is_empty());
    assert_eq!(uplink.unconfirmed_len(), 1);

    clock.advance(Duration::from_millis(200));
    let expired = uplink.requeue_expired();
    assert_eq!(expired.len(), 1);
    assert_eq!(uplink.unconfirmed_len(), 0);

    // Retransmission keeps the nonce and the original send_time.
    let resent = uplink.prepare_transmit(expired.into_iter().next().unwrap());
    assert_eq!(resent.id, Some(7));
    assert_eq!(resent.send_time, 1000.0);
    assert!(resent.message_transmit_time > first_transmit_time);
    assert_eq!(uplink.next_nonce(), 8);

    assert_eq!(uplink.on_ack(7), 1);
    assert_eq!(uplink.unconfirmed_len(), 0);
}

/// Each entry lands on exactly one side of the partition.
#[test]
fn test_requeue_partition_is_exact() {
    let (clock, mut uplink) = uplink_at(100);
    uplink.prepare_transmit(batch(1.0));
    clock.advance(Duration::from_secs(3));
    uplink.prepare_transmit(batch(2.0));
    clock.advance(MESSAGE_ACK_TIMEOUT - Duration::from_secs(3));

    // First entry is 5 s old, second only 2 s.
    let expired = uplink.requeue_expired();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, Some(100));
    assert_eq!(uplink.unconfirmed_len(), 1);

    clock.advance(Duration::from_secs(3));
    let expired = uplink.requeue_expired();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, Some(101));
    assert_eq!(uplink.unconfirmed_len(), 0);
}

#[test]
fn test_take_unconfirmed_empties_the_list() {
    let (_clock, mut uplink) = uplink_at(1);
    uplink.prepare_transmit(batch(1.0));
    uplink.prepare_transmit(batch(2.0));
    let taken = uplink.take_unconfirmed();
    assert_eq!(taken.len(), 2);
    assert_eq!(uplink.unconfirmed_len(), 0);
}
