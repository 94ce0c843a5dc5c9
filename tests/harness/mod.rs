//! Test harness utilities for engine and transport integration tests.
//!
//! This module provides a scripted in-memory connector and a loopback
//! WebSocket server.

#![allow(dead_code)]

mod connector;
mod server;

pub use connector::{Script, ScriptedConnector};
pub use server::{ServerMode, TestServer};
