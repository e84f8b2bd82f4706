//! E2E integration tests for infraprobe-harness.
//!
//! These tests drive full apply → validate → destroy cycles through the public
//! API against a fault-injectable fake engine and an in-memory cloud, so teardown
//! guarantees can be checked against what is actually left behind.
//!
//! # Test Structure
//!
//! - `helpers/` -- Fake provisioning engine, in-memory cloud, scenario builders
//! - `scenarios/` -- Test files organized by behavior
//!
//! # Running
//!
//! ```bash
//! cargo test -p infraprobe-harness --test e2e
//! ```

mod helpers;
mod scenarios;
