//! # Pingfleet Proto
//!
//! The shared layer of the pingfleet latency-monitoring fabric: the
//! fixed-width latency codec, the JSON wire messages exchanged between
//! probers and the collector, the catalog data model, and the clock
//! abstraction used to make timing-sensitive logic deterministic in tests.

pub mod clock;
pub mod latency;
pub mod message;
pub mod model;

pub use clock::{Clock, ManualClock, SystemClock};
pub use latency::{decode, encode, encode_seconds, LATENCY_MAX, LATENCY_TIMEOUT};
pub use message::{FromProber, Output, Reply, TargetSpec, ToProber};
pub use model::{ControlKind, ControlMessage, ProbeKind, Prober, Target};
