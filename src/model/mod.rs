//! Data models for the peer tester
//!
//! Plain data shared by the session, registry and capture components:
//! handle identities, payloads, relay descriptors, capture streams, events
//! and log entries.

pub mod capture;
pub mod event;
pub mod ids;
pub mod log;
pub mod payload;
pub mod relay;
