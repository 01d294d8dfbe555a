//! Storage is organized through [session_store::JsonSessionStore].
//! The basic idea is:
//!  - There is a directory with the two JSON-document logs.
//!  - The session log holds cumulative snapshots, appended once a minute.
//!  - The retry queue holds snapshots whose remote sync failed, until a
//!    retry succeeds.

pub mod entities;
pub mod session_store;
