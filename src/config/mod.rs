// ABOUTME: Configuration module organization for strideline
// ABOUTME: Exposes environment-based server configuration
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Configuration management.

pub mod environment;

pub use environment::{Environment, ServerConfig, StravaCredentials};
