//! The Result Dispatcher (§4.5): parses engine events on the calling
//! thread, applies the confidence gate, runs text post-processing, and
//! emits keystrokes plus GUI updates.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::engine::recognizer::Alternative;
use crate::engine::worker::EngineEvent;
use crate::sink::{GuiSink, KeystrokeSink};
use crate::text;
use crate::threshold::ThresholdController;

/// Minimum interval between partial-text GUI posts (§4.5: "throttled to
/// ~5 Hz").
const PARTIAL_POST_INTERVAL: Duration = Duration::from_millis(200);

/// Parses engine events into typed text, applying the confidence gate and
/// post-processing pipeline in order.
pub struct ResultDispatcher {
    threshold: Arc<Mutex<ThresholdController>>,
    keystrokes: Arc<dyn KeystrokeSink>,
    gui: Arc<dyn GuiSink>,
    last_partial_post: Instant,
    /// Set once the first Final of the session has been typed, so the next
    /// utterance gets a leading space (§4.5 item 4).
    any_utterance_typed: bool,
}

impl ResultDispatcher {
    pub fn new(
        threshold: Arc<Mutex<ThresholdController>>,
        keystrokes: Arc<dyn KeystrokeSink>,
        gui: Arc<dyn GuiSink>,
    ) -> Self {
        Self {
            threshold,
            keystrokes,
            gui,
            last_partial_post: Instant::now() - PARTIAL_POST_INTERVAL,
            any_utterance_typed: false,
        }
    }

    /// Handle one event from the Engine Worker. `current_energy` is the
    /// Audio Worker's most recently observed chunk energy, used by the
    /// dynamic confidence penalty (§4.3).
    pub fn handle(&mut self, event: EngineEvent, current_energy: f32) {
        match event {
            EngineEvent::Partial { text } => self.handle_partial(&text),
            EngineEvent::Final {
                alternatives,
                discard,
            } => self.handle_final(alternatives, discard, current_energy),
            EngineEvent::Fatal { detail } => {
                error!(detail = %detail, "engine worker reported a fatal error");
            }
        }
    }

    fn handle_partial(&mut self, text: &str) {
        if self.last_partial_post.elapsed() < PARTIAL_POST_INTERVAL {
            return;
        }
        self.last_partial_post = Instant::now();
        self.gui.set_partial(text);
    }

    fn handle_final(&mut self, alternatives: Vec<Alternative>, discard: bool, current_energy: f32) {
        if discard {
            // §4.2/§9: the too-short-utterance path discards the Final
            // entirely, never emitting characters already typed by a
            // Partial.
            return;
        }
        let Some(best) = alternatives.into_iter().next() else {
            return;
        };

        // Absence of a confidence score means "unscored" (§3); treat it as
        // automatically accepted since there is nothing to gate on.
        let accepted = match best.confidence {
            Some(confidence) => self.threshold.lock().accept(confidence, current_energy),
            None => true,
        };
        if !accepted {
            warn!(text = %best.text, confidence = ?best.confidence, "final result rejected by confidence gate");
            return;
        }

        let processed = text::process(&best.text, self.any_utterance_typed);
        if processed.trim().is_empty() {
            return;
        }

        if let Err(e) = self.keystrokes.type_text(&processed) {
            // §7: keystroke sink error — surface once, keep transcribing.
            error!(error = %e, "keystroke injection failed");
        }
        self.gui.append_final(&processed, best.confidence);
        self.any_utterance_typed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullGuiSink;
    use crate::threshold::ThresholdConfig;
    use std::sync::Mutex as StdMutex;

    fn dispatcher_with_capture() -> (ResultDispatcher, Arc<StdMutex<Vec<String>>>) {
        struct CaptureSink(Arc<StdMutex<Vec<String>>>);
        impl KeystrokeSink for CaptureSink {
            fn type_text(&self, text: &str) -> Result<(), String> {
                self.0.lock().unwrap().push(text.to_string());
                Ok(())
            }
        }
        let captured = Arc::new(StdMutex::new(Vec::new()));
        let threshold = Arc::new(Mutex::new(ThresholdController::new(ThresholdConfig {
            audio_threshold_multiplier: 1.5,
            noise_floor_percentile: 10,
            speech_floor_percentile: 70,
            confidence_threshold: 200.0,
            speech_min_multiplier: 0.5,
            speech_max_multiplier: 2.0,
            max_confidence_penalty: 150.0,
        })));
        let dispatcher = ResultDispatcher::new(
            threshold,
            Arc::new(CaptureSink(Arc::clone(&captured))),
            Arc::new(NullGuiSink),
        );
        (dispatcher, captured)
    }

    #[test]
    fn discarded_final_types_nothing() {
        let (mut dispatcher, captured) = dispatcher_with_capture();
        dispatcher.handle(
            EngineEvent::Final {
                alternatives: vec![Alternative {
                    text: "hello".into(),
                    confidence: Some(999.0),
                }],
                discard: true,
            },
            0.0,
        );
        assert!(captured.lock().unwrap().is_empty());
    }

    #[test]
    fn accepted_final_is_post_processed_and_typed() {
        let (mut dispatcher, captured) = dispatcher_with_capture();
        dispatcher.handle(
            EngineEvent::Final {
                alternatives: vec![Alternative {
                    text: "hello period new line world".into(),
                    confidence: Some(300.0),
                }],
                discard: false,
            },
            0.0,
        );
        assert_eq!(captured.lock().unwrap().as_slice(), ["Hello.\nWorld"]);
    }

    #[test]
    fn below_base_threshold_is_rejected_uncalibrated() {
        let (mut dispatcher, captured) = dispatcher_with_capture();
        dispatcher.handle(
            EngineEvent::Final {
                alternatives: vec![Alternative {
                    text: "hello".into(),
                    confidence: Some(50.0),
                }],
                discard: false,
            },
            0.0,
        );
        assert!(captured.lock().unwrap().is_empty());
    }

    #[test]
    fn unscored_confidence_is_accepted() {
        let (mut dispatcher, captured) = dispatcher_with_capture();
        dispatcher.handle(
            EngineEvent::Final {
                alternatives: vec![Alternative {
                    text: "hello".into(),
                    confidence: None,
                }],
                discard: false,
            },
            0.0,
        );
        assert_eq!(captured.lock().unwrap().as_slice(), ["Hello"]);
    }

    #[test]
    fn second_utterance_gets_leading_space() {
        let (mut dispatcher, captured) = dispatcher_with_capture();
        for text in ["hello", "world"] {
            dispatcher.handle(
                EngineEvent::Final {
                    alternatives: vec![Alternative {
                        text: text.into(),
                        confidence: Some(300.0),
                    }],
                    discard: false,
                },
                0.0,
            );
        }
        assert_eq!(
            captured.lock().unwrap().as_slice(),
            ["Hello", " World"]
        );
    }
}
