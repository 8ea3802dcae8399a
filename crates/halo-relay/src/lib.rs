//! Local HTTP relay between the agent server and the overlay UI process.
//!
//! The server half accepts status pushes from the agent side and hands them
//! to the UI event channel; the client half forwards user commands to the
//! agent server. Both sides speak plain HTTP on loopback-only ports with no
//! authentication; the deployment trusts localhost.

pub mod client;
pub mod server;

pub use client::AgentClient;
pub use server::{router, RelayState};
