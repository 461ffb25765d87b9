use pingfleet_icmp::packet::EchoReply;
use pingfleet_icmp::TickState;
use std::net::Ipv4Addr;

const OWN_ID: u16 = 0x4242;
const SEQ: u16 = 42;

fn reply_from(source: Ipv4Addr) -> EchoReply {
    EchoReply {
        source,
        identifier: OWN_ID,
        sequence: SEQ,
    }
}

/// One alive and one dead destination: the batch carries the reply first,
/// then the timeout, and every destination exactly once.
#[test]
fn test_alive_and_dead_destinations() {
    let alive = Ipv4Addr::new(10, 0, 0, 1);
    let dead = Ipv4Addr::new(10, 0, 0, 255);
    let mut tick = TickState::new(OWN_ID, SEQ, 1000.0, &[alive, dead]);

    assert!(tick.accept(&reply_from(alive), 1000.0123));
    assert!(!tick.all_replied());

    let batch = tick.finish();
    assert_eq!(batch.send_time, 1000.0);
    assert_eq!(
        batch.replies,
        vec![(alive, Some(1000.0123)), (dead, None)]
    );
}

#[test]
fn test_stale_sequence_is_ignored() {
    let dst = Ipv4Addr::new(10, 0, 0, 1);
    let mut tick = TickState::new(OWN_ID, SEQ, 0.0, &[dst]);
    let stale = EchoReply {
        source: dst,
        identifier: OWN_ID,
        sequence: SEQ - 1,
    };
    assert!(!tick.accept(&stale, 0.1));
    // The destination stays pending for the rest of the window.
    assert!(!tick.all_replied());
    assert_eq!(tick.finish().replies, vec![(dst, None)]);
}

#[test]
fn test_foreign_identifier_is_ignored() {
    let dst = Ipv4Addr::new(10, 0, 0, 1);
    let mut tick = TickState::new(OWN_ID, SEQ, 0.0, &[dst]);
    let foreign = EchoReply {
        source: dst,
        identifier: OWN_ID ^ 1,
        sequence: SEQ,
    };
    assert!(!tick.accept(&foreign, 0.1));
    assert!(!tick.all_replied());
}

#[test]
fn test_unexpected_source_is_ignored() {
    let dst = Ipv4Addr::new(10, 0, 0, 1);
    let mut tick = TickState::new(OWN_ID, SEQ, 0.0, &[dst]);
    assert!(!tick.accept(&reply_from(Ipv4Addr::new(192, 168, 0, 9)), 0.1));
    assert!(!tick.all_replied());
}

#[test]
fn test_duplicate_reply_counts_once() {
    let dst = Ipv4Addr::new(10, 0, 0, 1);
    let mut tick = TickState::new(OWN_ID, SEQ, 0.0, &[dst]);
    assert!(tick.accept(&reply_from(dst), 0.1));
    assert!(tick.all_replied());
    assert!(!tick.accept(&reply_from(dst), 0.2));
    assert_eq!(tick.finish().replies, vec![(dst, Some(0.1))]);
}

#[test]
fn test_all_replied_completes_in_arrival_order() {
    let a = Ipv4Addr::new(10, 0, 0, 1);
    let b = Ipv4Addr::new(10, 0, 0, 2);
    let c = Ipv4Addr::new(10, 0, 0, 3);
    let mut tick = TickState::new(OWN_ID, SEQ, 0.0, &[a, b, c]);
    assert!(tick.accept(&reply_from(c), 0.01));
    assert!(tick.accept(&reply_from(a), 0.02));
    assert!(tick.accept(&reply_from(b), 0.03));
    assert!(tick.all_replied());
    assert_eq!(
        tick.finish().replies,
        vec![(c, Some(0.01)), (a, Some(0.02)), (b, Some(0.03))]
    );
}
