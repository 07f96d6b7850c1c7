//! Dermatology billing recommendation engine.
//!
//! The core is a deterministic rules engine (tier tables, repair
//! aggregation, destruction tiering, NCCI checks) consumed as a library;
//! around it sits a thin HTTP API and CLI.

pub mod analyzer;
pub mod cli;
pub mod codes;
pub mod decode;
pub mod entities;
pub mod models;
pub mod rules;
pub mod scenarios;
pub mod server;
