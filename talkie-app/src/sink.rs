//! `talkie-app`'s collaborators for [`talkie_core::sink::KeystrokeSink`] and
//! [`talkie_core::sink::GuiSink`] (§6).

use enigo::{Enigo, Keyboard, Settings};
use parking_lot::Mutex;
use talkie_core::sink::{GuiSink, KeystrokeSink};
use tracing::info;

/// Types recognized text into whatever window currently has keyboard focus,
/// via `enigo`'s cross-platform synthetic-input backend.
///
/// `enigo::Enigo::text` takes `&mut self`, but `KeystrokeSink::type_text`
/// takes `&self` (the Result Dispatcher holds this behind an `Arc`) — a
/// `Mutex` bridges the two.
pub struct EnigoKeystrokeSink {
    enigo: Mutex<Enigo>,
}

impl EnigoKeystrokeSink {
    pub fn new() -> Result<Self, String> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| format!("initializing enigo: {e:?}"))?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }
}

impl KeystrokeSink for EnigoKeystrokeSink {
    fn type_text(&self, text: &str) -> Result<(), String> {
        if text.is_empty() {
            return Ok(());
        }
        // Gives the target window a moment to regain focus after whatever
        // triggered this final (e.g. a global hotkey release).
        std::thread::sleep(std::time::Duration::from_millis(50));
        self.enigo
            .lock()
            .text(text)
            .map_err(|e| format!("typing text: {e:?}"))
    }
}

/// Prints partials, finals, and energy levels to stdout. `talkie-app` has
/// no widget tree of its own (§6's GUI is a future, separate consumer of
/// [`talkie_core::ipc::events`]) — this is the default so the pipeline has
/// somewhere to send its ~5 Hz updates when run as a plain CLI.
#[derive(Debug, Default)]
pub struct ConsoleGuiSink;

impl GuiSink for ConsoleGuiSink {
    fn set_partial(&self, text: &str) {
        print!("\r\x1b[2K...{text}");
        use std::io::Write;
        std::io::stdout().flush().ok();
    }

    fn append_final(&self, text: &str, confidence: Option<f32>) {
        match confidence {
            Some(c) => info!(confidence = c, "{text}"),
            None => info!("{text}"),
        }
        println!("\r\x1b[2K{text}");
    }

    fn set_energy(&self, _energy: f32) {
        // No meter to drive without a widget tree; the GUI consumes this
        // via talkie_core::ipc::events::AudioActivityEvent instead.
    }
}
