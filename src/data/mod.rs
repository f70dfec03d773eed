//! Data module: scalars, local storage and exchange staging.

pub mod exchange_buffers;
pub mod scalar;
pub mod storage;

pub use exchange_buffers::ExchangeBuffers;
pub use scalar::Scalar;
pub use storage::{Storage, VecStorage};
