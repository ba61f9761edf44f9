//! Library crate for edge-scan-rs exposing reusable modules.
pub mod addrgen;
pub mod catalog;
pub mod enrich;
pub mod probe;
pub mod ranking;
pub mod resolvers;
pub mod rewrite;
pub mod scanner;
pub mod server;
pub mod speedtest;
pub mod types;
