// ABOUTME: Shared HTTP client utilities with connection pooling and timeout configuration
// ABOUTME: Provides a process-wide reqwest client so outbound calls always carry timeouts
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use reqwest::{Client, ClientBuilder};
use std::sync::OnceLock;
use std::time::Duration;

/// Global shared HTTP client with default configuration
static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

/// Get or create the shared HTTP client.
///
/// The client uses connection pooling, a 30 s request timeout, and a 10 s
/// connect timeout. Every outbound provider call goes through this client so
/// no request can hang a worker indefinitely.
pub fn shared_client() -> &'static Client {
    SHARED_CLIENT.get_or_init(|| {
        ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}
