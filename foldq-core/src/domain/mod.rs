//! Domain types shared across the workspace.

pub mod job;
pub mod resources;
