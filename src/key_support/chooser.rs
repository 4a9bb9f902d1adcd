use crate::algorithm::CoseAlgorithm;
use crate::events::{Event, Events};

use super::KeySupport;

/// Picks the first algorithm, in the relying party's preference order, that
/// has a [`KeySupport`] implementation. Unsupported entries are skipped.
#[derive(Debug, Clone, Default)]
pub struct KeySupportChooser {
    events: Events,
}

impl KeySupportChooser {
    pub fn new(events: Events) -> Self {
        Self { events }
    }

    pub fn choose(&self, requested: &[CoseAlgorithm]) -> Option<KeySupport> {
        for &alg in requested {
            match KeySupport::for_algorithm(alg) {
                Some(support) => {
                    self.events
                        .emit(Event::AlgorithmNegotiated { algorithm: alg });
                    return Some(support);
                }
                None => self.events.emit(Event::AlgorithmSkipped { algorithm: alg }),
            }
        }
        self.events.emit(Event::NegotiationFailed {
            requested: requested.to_vec(),
        });
        None
    }
}
