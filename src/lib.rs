//! Data Retriever Core Library
//!
//! A generic search-and-fetch client for remote data archives indexed by time.
//! Typed query constraints become a request descriptor, a pluggable strategy
//! resolves the descriptor into locators, and the resulting records are
//! downloaded concurrently to computed local paths.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`attrs`] - Typed query constraints (time, wavelength, instrument, ...)
//! - [`query`] - Request descriptors and the attribute mapper
//! - [`strategy`] - Resolution strategies and strategy dispatch
//! - [`response`] - Result records and result sets
//! - [`download`] - Destination paths, transport, and the download orchestrator
//! - [`client`] - The search/fetch façade
//! - [`config`] - Explicit client configuration
//! - [`time`] - Time ranges and time parsing

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod attrs;
pub mod client;
pub mod config;
pub mod download;
pub mod query;
pub mod response;
pub mod strategy;
pub mod time;

// Re-export commonly used types
pub use client::{ClientError, GenericClient};
pub use config::ClientConfig;
pub use download::{
    DestinationPath, DownloadContext, DownloadError, ErrorCallback, FetchError, FetchHandle,
    FetchResults, PathError, TaskState,
};
pub use query::{AttributeMapper, DescriptorValue, QueryError, RequestDescriptor};
pub use response::{NOT_AVAILABLE, ResultRecord, ResultSet, ResultSetError};
pub use strategy::{
    DirectStrategy, PatternStrategy, ResolutionStrategy, StrategyError, StrategyRegistry,
};
pub use time::{TimeParseError, TimeRange};
