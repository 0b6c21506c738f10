// ABOUTME: Unit normalization module organization
// ABOUTME: Cadence normalization applied at the presentation boundary
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Unit normalization helpers.

pub mod cadence;
