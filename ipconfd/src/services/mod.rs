//! Service modules for ipconfd.
//!
//! Following the actor pattern:
//! - The config manager owns the interface state and consumes commands
//! - The remote router translates inbound commands into manager commands

pub mod config;
pub mod remote;
