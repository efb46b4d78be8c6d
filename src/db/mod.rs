//! Database module: entity models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: view models returned by repositories to the delivery engine.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! External modules should import from `tg_postman::db` — we re-export the
//! repository API and the view models for convenience.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{GroupRecipient, NewPost, PostForDelivery};
