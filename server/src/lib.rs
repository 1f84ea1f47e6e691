//! Foodlink Server
//!
//! Account registration, login and bearer-token authorization for the
//! Foodlink household food-management backend.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
