//! # navtree
//!
//! Library half of the navtree binary: HTTP API, CLI and configuration.
//! Integration tests drive the API through [`api::create_router`].

pub mod api;
pub mod cli;
pub mod config;
