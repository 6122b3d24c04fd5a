//! External collaborator contracts (§6): the Keystroke Sink and GUI Sink.
//!
//! Both are out of scope for the core pipeline itself — the synthetic
//! keystroke driver and the widget tree live outside this crate — but the
//! pipeline needs a trait boundary to call into them. `talkie-app` supplies
//! real implementations; the `Null*` variants here exist so the pipeline is
//! fully testable (and runnable headless) without either collaborator.

/// Injects recognized text as synthetic keystrokes into whatever window
/// currently has keyboard focus.
///
/// Implementations are expected to return promptly; failures are logged by
/// the caller, not propagated as pipeline errors (§7, "Keystroke sink
/// error").
pub trait KeystrokeSink: Send + Sync {
    fn type_text(&self, text: &str) -> Result<(), String>;
}

/// The three one-way channels the Result Dispatcher and Audio Worker post
/// updates through, at ≤5 Hz (§6). The GUI never reads shared state
/// directly — every update arrives through one of these calls.
pub trait GuiSink: Send + Sync {
    fn set_partial(&self, text: &str);
    fn append_final(&self, text: &str, confidence: Option<f32>);
    fn set_energy(&self, energy: f32);
}

/// A `KeystrokeSink` that drops everything. Useful for tests and for
/// running the pipeline with injection disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKeystrokeSink;

impl KeystrokeSink for NullKeystrokeSink {
    fn type_text(&self, _text: &str) -> Result<(), String> {
        Ok(())
    }
}

/// A `GuiSink` that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullGuiSink;

impl GuiSink for NullGuiSink {
    fn set_partial(&self, _text: &str) {}
    fn append_final(&self, _text: &str, _confidence: Option<f32>) {}
    fn set_energy(&self, _energy: f32) {}
}
