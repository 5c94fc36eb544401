//! Retrieval of source files from the event repository.

pub mod client;

pub use client::SourceClient;
