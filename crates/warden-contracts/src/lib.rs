//! # warden-contracts
//!
//! Shared types, rules, and error contracts for the WARDEN agent permission
//! core.
//!
//! Every crate in the workspace imports from here. No decision logic lives in
//! this crate, only data definitions, small constructors, and the
//! deterministic operation-to-tool mapping.

pub mod access;
pub mod agent;
pub mod error;
pub mod operation;
pub mod permission;
pub mod security;
pub mod tool;
