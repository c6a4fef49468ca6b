//! Kubernetes workload observability for context-hungry assistants.
//!
//! `kubewatch` periodically samples the state of one or more deployments —
//! replica status, pods and their container metrics, recent events, logs,
//! autoscaler state, and optionally the application's own Prometheus
//! metrics — keeps a bounded time-windowed history per target, flags
//! anomalies, and renders everything into a compact, budget-constrained
//! text block ready for injection into a language-model prompt.
//!
//! The pieces compose top-down:
//!
//! - [`MultiWatcher`] owns one [`Watcher`] per configured target;
//! - each [`Watcher`] drives the ordered collection pipeline on a fixed
//!   interval and writes its own [`Store`];
//! - [`summary`] renders live stores into context blocks and one-line
//!   status summaries;
//! - [`Recorder`] is the seam for operational metrics
//!   (`kubewatch-prometheus` provides the Prometheus-backed impl).

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod client;
mod collect;
pub mod config;
pub mod detect;
pub mod model;
mod multi;
mod promtext;
pub mod recorder;
pub mod shutdown;
pub mod store;
pub mod summary;
mod watcher;

pub use self::config::{MultiWatchConfig, WatchConfig, WatchTarget};
pub use self::multi::MultiWatcher;
pub use self::recorder::{NoopRecorder, Recorder};
pub use self::store::Store;
pub use self::watcher::Watcher;
