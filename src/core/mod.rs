//! Core abstractions shared by every layer

pub mod config;
pub mod error;
pub mod invoker;
pub mod types;
