//! Convergence tests for the SecurityProfile reconciler
//!
//! These run the real synchronizer, labeler, and orchestrator against an
//! in-memory API server, so they need no cluster.
//!
//! # Test Organization
//!
//! - `fake_cluster`: the in-memory API server with failure injection
//! - `scenarios`: stories about rollout, steady state, drift, and recovery

mod fake_cluster;
mod scenarios;
