//! In-Process Recognizer variant (§4.4): wraps a streaming recognizer
//! library directly in the Engine Worker's address space.

pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use stub::StubModel;

#[cfg(feature = "onnx")]
pub use onnx::{OnnxModel, OnnxModelConfig};
