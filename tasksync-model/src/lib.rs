//! Shared data model for `TaskSync`: tasks, offline actions, backend
//! documents, and the blob codec used for on-device persistence.

pub mod action;
pub mod codec;
pub mod document;
pub mod replay;
pub mod task;
pub mod user;
