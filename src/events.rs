//! Discrete observability events.
//!
//! Every component logs through `tracing`; components that take an
//! [`Events`] handle also forward the same event to an injected sink so
//! embedders and tests can observe negotiation results, state transitions
//! and failure kinds without scraping logs.

use std::sync::Arc;

use crate::algorithm::CoseAlgorithm;
use crate::ceremony::{CeremonyKind, CeremonyState, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    AlgorithmSkipped {
        algorithm: CoseAlgorithm,
    },
    AlgorithmNegotiated {
        algorithm: CoseAlgorithm,
    },
    NegotiationFailed {
        requested: Vec<CoseAlgorithm>,
    },
    StateChanged {
        ceremony: CeremonyKind,
        from: CeremonyState,
        to: CeremonyState,
    },
    CeremonyFailed {
        ceremony: CeremonyKind,
        kind: ErrorKind,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Optional sink plus the `tracing` fallback. Cheap to clone.
#[derive(Clone, Default)]
pub struct Events {
    sink: Option<Arc<dyn EventSink>>,
}

impl Events {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: Event) {
        match &event {
            Event::AlgorithmSkipped { algorithm } => {
                tracing::debug!(%algorithm, "Algorithm not supported, skipping");
            }
            Event::AlgorithmNegotiated { algorithm } => {
                tracing::debug!(%algorithm, "Algorithm negotiated");
            }
            Event::NegotiationFailed { requested } => {
                tracing::info!(?requested, "No supported algorithm in request");
            }
            Event::StateChanged { ceremony, from, to } => {
                tracing::debug!(?ceremony, ?from, ?to, "Ceremony state changed");
            }
            Event::CeremonyFailed { ceremony, kind } => {
                tracing::warn!(?ceremony, ?kind, "Ceremony failed");
            }
        }
        if let Some(sink) = &self.sink {
            sink.emit(&event);
        }
    }
}

impl std::fmt::Debug for Events {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Events")
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
