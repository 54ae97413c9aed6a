//! Test execution engine
//!
//! Drives declarative tests (arrange, then act and assert per case) to
//! completion and reports structured results to a container, either
//! sequentially, fully in parallel, or in parallel partitioned by an
//! affinity trait so that tests sharing a trait value never overlap.

pub mod cli;
pub mod config;
pub mod demos;
pub mod executor;
pub mod models;
pub mod naming;
pub mod output;
pub mod utils;
