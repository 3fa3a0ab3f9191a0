//! Turnstile - In-Process HTTP Rate Limiting
//!
//! This crate implements a per-client request rate limiter that fronts an
//! HTTP handling pipeline. It supports two throttling algorithms (a fixed
//! window counter and an exact sliding window log) behind a single façade,
//! with per-client state evaluated concurrently and no shared locks across
//! clients.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
