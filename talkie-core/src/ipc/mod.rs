//! Event types posted to the GUI Sink (§6).
//!
//! These are the wire shapes `talkie-app`'s GUI implementation serializes
//! its `GuiSink` calls into; `talkie-core` itself never serializes them —
//! the trait in [`crate::sink`] passes borrowed values directly.

pub mod events;
