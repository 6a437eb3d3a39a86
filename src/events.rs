//! Live Event Publisher wrapper (C7, §4.7).
//!
//! Thin best-effort shim around an `EventPublisher` collaborator: every
//! call is caught and logged as a warning, never propagated, because the
//! scheduler must never let a downstream listener's outage affect
//! execution. Grounded on the teacher's `vrm_state_listener.rs` best-effort
//! listener notification pattern.

use std::sync::Arc;

use crate::external::event_stream::{EventPublisher, SchedulerEvent};

#[derive(Clone)]
pub struct EventSink {
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl EventSink {
    pub fn new(publisher: Option<Arc<dyn EventPublisher>>) -> Self {
        EventSink { publisher }
    }

    pub fn disabled() -> Self {
        EventSink { publisher: None }
    }

    pub async fn start(&self) {
        let Some(publisher) = &self.publisher else { return };
        if let Err(err) = publisher.start().await {
            log::warn!("event publisher failed to start: {err}");
        }
    }

    pub async fn publish(&self, event: SchedulerEvent) {
        let Some(publisher) = &self.publisher else { return };
        if let Err(err) = publisher.publish(event).await {
            log::warn!("event publisher call failed, dropping event: {err}");
        }
    }
}
