//! Messaging, synchronization and reductions.

pub mod communicator;
pub mod reduction;
pub mod synchronize;
pub mod wire;

pub use synchronize::{cumulate, distribute};
