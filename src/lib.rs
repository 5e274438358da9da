pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

pub use {
    builder::Builder,
    collector::{Collector, Recorder},
    exposition::{emit, Connection, MetricKind},
    registry::{Config, Handler, Registry},
};

mod builder;
mod collector;
mod exposition;
pub mod process;
mod registry;
#[cfg(feature = "service")]
pub mod service;
