//! Side-effecting adapters for the act phase.

pub mod config;
pub mod instruction;
pub mod publish;
pub mod scenario;
pub mod slot;
pub mod trace;
