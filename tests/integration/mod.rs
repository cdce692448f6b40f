//! Integration tests module
//!
//! This module organizes all integration tests for the r-jellyshim application.

pub mod config_test;
pub mod event_channel_test;
pub mod jellyfin_client_test;
pub mod session_test;
