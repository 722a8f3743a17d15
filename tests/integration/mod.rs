//! Integration test suite for Abacus.
//!
//! These tests drive the orchestrator the way the running service does:
//! expressions go in through `submit`, tasks come out of the queue and
//! results flow back until every expression reaches a terminal status.
//!
//! # Test Categories
//!
//! - `distributed_e2e`: distributed evaluation agrees with the local calculator
//! - `ordering`: arbitrary completion order, duplicates and stale results
//! - `worker_pool`: in-process workers draining the orchestrator
//! - `http_agents`: remote agents over a real HTTP listener

mod fixtures;

mod distributed_e2e;
mod ordering;
mod worker_pool;
