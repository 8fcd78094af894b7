//! Client-side reconciliation engine for a collaborative task board.
//!
//! One board is resident at a time in the [`store`]. User actions go
//! through [`commands`], which apply an optimistic change and then merge
//! the backend's confirmation. Other users' changes arrive on the event
//! stream kept open by the [`supervisor`] and are merged by [`events`].
//! Both paths end in the same idempotent store merges, so an event echoing
//! this client's own command changes nothing.

pub mod backend;
pub mod commands;
pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod planner;
pub mod store;
pub mod supervisor;
pub mod ui;
