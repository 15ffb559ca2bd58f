pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod query;
pub mod resolver;
pub mod series;

pub use error::{AdapterError, Result};

/// Label used to attribute a series to a pod unless configured otherwise.
pub const DEFAULT_IDENTIFYING_LABEL: &str = "k8s.pod.name";
