//! Trust chain assembly — reconstructing a verifiable chain from records.

pub mod assembler;

pub use assembler::{assemble, TrustChain};
