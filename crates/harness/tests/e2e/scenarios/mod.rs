//! E2E test scenarios.
//!
//! - teardown: destroy runs exactly once under apply/validation faults
//! - retry: transient provider errors and attempt budgets
//! - isolation: concurrent scenarios with colliding expectations
//! - network: targeted network + public subnet apply
//! - storage: bucket and encryption checks
//! - suite: the example suite file against the fake engine

mod isolation;
mod network;
mod retry;
mod storage;
mod suite;
mod teardown;
