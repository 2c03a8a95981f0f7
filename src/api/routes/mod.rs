//! API Routes
//!
//! Route handlers organized by functionality.

pub mod activity;
pub mod auth;
pub mod calendar;
pub mod dashboard;
pub mod friends;
pub mod goals;
pub mod health;
pub mod notes;
pub mod profile;
pub mod users;
