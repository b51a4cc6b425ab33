//! Lock-free cross-thread handoff primitives.
//!
//! No mutex guards frame or input data anywhere in the pipeline: the
//! latest-wins [`ExchangeSlot`] moves whole payloads between threads,
//! and the truncating [`RingBuffer`] streams typed characters.

pub mod exchange;
pub mod ring;

pub use exchange::ExchangeSlot;
pub use ring::RingBuffer;
