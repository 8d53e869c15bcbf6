//! Utilities shared by the services.

pub mod network;
