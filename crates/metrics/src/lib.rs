//! Metrics collection and export for parley.
//!
//! Crates record through the `metrics` facade macros re-exported here; the
//! names live in [`definitions`] so dashboards have a single reference. When
//! the `prometheus` feature is enabled, [`init_metrics`] installs a Prometheus
//! recorder whose text rendering is available from [`MetricsHandle::render`].
//!
//! ```rust,ignore
//! use parley_metrics::{counter, sessions};
//!
//! counter!(sessions::CREATED_TOTAL).increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
