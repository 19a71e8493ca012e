//! Deterministic logic shared by every act-phase variant.
//!
//! Core modules perform no I/O. They operate on in-memory data structures and
//! call collaborators only through the traits defined here.

pub mod action;
pub mod action_log;
pub mod drive;
pub mod goal_graph;
pub mod plan;
pub mod selector;
pub mod types;
