// (c) 2024 Ross Younger
//! The raw UDP mechanism
//!
//! A sender splits one regular file into chunks and fires each at the receiver as a single
//! datagram (see [`crate::protocol`] for the wire format). The receiver collects chunks until
//! it holds every sequence number, then writes them out in order.
//!
//! This is deliberately minimal: it suits fast, clean local networks and nothing else.

mod reassembly;
pub use reassembly::ReassemblyBuffer;

mod receiver;
pub use receiver::{receive, receive_on, ReceiveOptions, ReceiveReport};

mod sender;
pub use sender::{send, SendOptions, SendReport};
