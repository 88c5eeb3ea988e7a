//! Command-line and HTTP front ends for the fitfmt integrity engine.
//!
//! Records live in a JSON file ([`file_store::JsonFileStore`]); the `fitfmt`
//! binary audits or repairs one page of them per call, and `fitfmt serve`
//! exposes the same invocation over `POST /integrity`.

pub mod cli;
pub mod file_store;
pub mod logging;
pub mod server;
