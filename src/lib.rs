//! Cactustv - personal media server
//!
//! This library crate exposes the streaming engine and the HTTP surface for
//! integration testing.

pub mod catalog;
pub mod config;
pub mod server;
pub mod settings;
pub mod streaming;
