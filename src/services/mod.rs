//! Business logic services.
//!
//! This module contains the assignment engine, reviewer selection, the team
//! directory and the HTTP layer that exposes them.
//!
//! Engine and directory operations take plain values and return
//! `Result<_, AppError>`; nothing transport-specific reaches them.

pub mod api;
pub mod api_server;
pub mod assignment;
pub mod directory;
pub mod reviewer_selector;

pub use api::AppState;
pub use api_server::{ApiServer, ApiServerHandle};
pub use assignment::AssignmentEngine;
