//! Main integration test entry point for r-jellyshim
//!
//! This file serves as the entry point for all integration tests.

mod integration;
