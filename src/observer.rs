//! Events emitted while mapping and delivering a payload.
//!
//! The applier and the forwarder never log directly for per-rule or
//! per-attempt outcomes; they hand a [`RelayEvent`] to an [`Observer`].
//! [`TracingObserver`] turns events into `tracing` records and [`Recorder`]
//! keeps them in memory.

use std::sync::Mutex;

use crate::engine::SkipReason;
use crate::errors::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// A mapping rule produced no output.
    RuleSkipped {
        index: usize,
        source: String,
        target: String,
        reason: SkipReason,
    },
    /// A combinator expression joined only some of its fields.
    PartialCombination { expr: String, missing: Vec<String> },
    /// A `{{path}}` token did not resolve and was replaced by "".
    TemplateTokenMissing { path: String },
    /// The template rule failed; rules were applied field by field instead.
    TemplateFallback { error: TemplateError },
    /// The target answered, whatever the status.
    Delivered { webhook_id: String, status: u16 },
    /// The target could not be reached.
    DeliveryFailed { webhook_id: String, error: String },
    /// The delivery record could not be stored.
    SinkFailed { webhook_id: String, error: String },
}

pub trait Observer: Send + Sync {
    fn observe(&self, event: RelayEvent);
}

/// Default observer: structured `tracing` output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, event: RelayEvent) {
        match event {
            RelayEvent::RuleSkipped { index, source, target, reason } => {
                tracing::warn!(index, %source, %target, %reason, "skipping mapping rule");
            }
            RelayEvent::PartialCombination { expr, missing } => {
                tracing::info!(%expr, ?missing, "some combined fields missing, using available fields");
            }
            RelayEvent::TemplateTokenMissing { path } => {
                tracing::debug!(%path, "template field not found, using empty string");
            }
            RelayEvent::TemplateFallback { error } => {
                tracing::warn!(%error, "template rule failed, falling back to field mappings");
            }
            RelayEvent::Delivered { webhook_id, status } => {
                tracing::info!(%webhook_id, status, "webhook forwarded");
            }
            RelayEvent::DeliveryFailed { webhook_id, error } => {
                tracing::error!(%webhook_id, %error, "failed to forward webhook");
            }
            RelayEvent::SinkFailed { webhook_id, error } => {
                tracing::error!(%webhook_id, %error, "failed to record webhook delivery");
            }
        }
    }
}

/// Keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<RelayEvent>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RelayEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Observer for Recorder {
    fn observe(&self, event: RelayEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
