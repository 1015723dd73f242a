//! Postboard - a posts CRUD service over a pooled relational database
//!
//! This library provides the storage layer, service and HTTP API; the
//! binary wires them together.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
