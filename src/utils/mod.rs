// ABOUTME: Utility module organization for strideline
// ABOUTME: Shared HTTP client and numeric helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Utility functions and helpers.

pub mod http_client;
pub mod stats;
