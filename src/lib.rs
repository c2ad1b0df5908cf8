//! Floodgate - Multi-Algorithm Request Rate Limiting
//!
//! This crate implements a request rate limiter that decides, for each
//! incoming request associated with a client key, whether to admit or reject
//! it against a configurable quota. Five interchangeable algorithms are
//! provided (token bucket, leaky bucket, fixed window, sliding window log,
//! sliding window counter) over a pluggable storage abstraction with an
//! in-process backend and a Redis-backed backend for distributed deployments.

pub mod clock;
pub mod config;
pub mod error;
pub mod limit;
pub mod store;
