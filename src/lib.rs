//! tgc-cache: versioned two-tier result cache with predictive compression.
//!
//! Caches computation results under content-addressed, date-versioned keys,
//! shrinking numeric payloads with a predictive geometric codec:
//!   recurrence predictor (lossless) → quantized radix-20 tokens (lossy,
//!   bounded error) → recursive application over nested documents.
//!
//! The store keeps every entry in two tiers (an in-process map and one
//! durable file per key) and builds keys whose prefix encodes the calendar
//! date and format version, so stale results are superseded automatically
//! without explicit invalidation.
//!
//! Everything is synchronous and local: no network, no background threads,
//! no internal locking. Callers needing cross-thread access serialize it
//! themselves.

pub mod base20;
pub mod codec;
pub mod config;
pub mod store;
