//! Webhook relay: receive a JSON callback, reshape it with field mappings or
//! a template, forward it to a target URL and record the outcome.

pub mod errors;
pub mod config;
pub mod engine;     // mapping applier, the main entry point
pub mod path;
pub mod combinator;
pub mod template;
pub mod fields;
pub mod observer;
pub mod sink;
pub mod forwarder;
pub mod server;
mod parser;

/// Re-export the most-used pieces for callers that only map and forward.
pub use combinator::combine;
pub use config::RelayConfig;
pub use engine::{apply_mappings, apply_mappings_with, MappingRule, SkipReason, TEMPLATE_TARGET};
pub use errors::{ConfigError, DeliveryError, PathError, SinkError, TemplateError};
pub use fields::{field_paths, fields_with_info, FieldInfo};
pub use forwarder::{DeliveryResponse, Forwarder};
pub use observer::{Observer, Recorder, RelayEvent, TracingObserver};
pub use path::{resolve, write, WriteOutcome};
pub use sink::{DeliveryRecord, DeliverySink, JsonLinesSink, MemorySink, TracingSink};
pub use template::render;
