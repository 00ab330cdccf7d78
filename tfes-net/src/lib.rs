//! # TFES Net
//!
//! `compio`-based async TCP I/O for the TFES broker: the client plane, the
//! peer plane, the two cross-plane broadcast tasks, and the broker wiring
//! that ties them together with a shared [`tfes_core::routing::RoutingTable`].

pub mod broadcast;
pub mod broker;
pub mod client;
pub mod io;
pub mod peer;

pub use broker::run;
