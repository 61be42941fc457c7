//! This crate provides the equistat server, a web service for analysing chemical
//! equipment datasets. Users upload CSV documents describing process equipment
//! (pumps, valves, compressors and so on) and the server validates them, stores
//! them per user, and serves summary statistics, filtered record views and
//! downloadable reports over a REST API.
//!
//! Datasets are held in an embedded [sled] database alongside the raw CSV blobs,
//! so the server runs from a single data directory with no external services.
//!
//! The server is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team. Axum performs well in [various](https://github.com/programatik29/rust-web-benchmarks/blob/master/result/hello-world.md) [benchmarks](https://web-frameworks-benchmark.netlify.app/result?l=rust)
//!   and is built on top of various popular components, including the [hyper] HTTP library.
//! * [Serde](serde) performs (de)serialisation of JSON request and response data.
//! * [csv] parses uploaded documents.
//! * [sled] provides the embedded metadata and user databases.
//! * [argon2] hashes account passwords.

pub mod app;
pub mod app_state;
pub mod auth;
pub mod cli;
pub mod dataset_store;
pub mod error;
pub mod metrics;
pub mod models;
pub mod operations;
pub mod report;
pub mod resource_manager;
pub mod server;
pub mod table;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod user_store;
pub mod validated_json;
