//! Customer 360 API Library
//!
//! Assembles a unified view of a customer by fanning out to the profile,
//! address, contact, product and analytics partitions of a document store
//! and merging the results into one composite record per customer.
//!
//! # Modules
//!
//! - `aggregator`: Batch coordination and tuning settings.
//! - `assembler`: Per-customer fan-out and merge.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: PostgreSQL document store.
//! - `errors`: Error handling types.
//! - `gateway`: Document store interface and partition layout.
//! - `handlers`: HTTP router and request handlers.
//! - `memory_store`: In-memory document store.
//! - `models`: Aggregation and wire models.

pub mod aggregator;
pub mod assembler;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod memory_store;
pub mod models;
