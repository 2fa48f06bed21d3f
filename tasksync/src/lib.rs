//! `TaskSync`: offline-first task storage and synchronization.
//!
//! Local writes always land in the durable task store first. Changes reach
//! the backend directly when the device is online and are queued in the
//! offline action log otherwise; the sync coordinator replays that log once
//! connectivity returns.

pub mod backend;
pub mod config;
pub mod connectivity;
pub mod session;
pub mod storage;
pub mod store;
pub mod sync;
pub mod tasks;
