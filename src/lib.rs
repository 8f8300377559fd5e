// src/lib.rs
//
// Library entry point for host consumers (native bridge, C ABI, wasm).

mod audio_buffer;
mod bridge;
mod dsp;
mod engine;
mod event;
mod voice;
mod voice_allocator;

pub mod config;
pub mod ffi;
pub mod module;
pub mod native;
pub mod package;
pub mod parameter;
pub mod patch;

#[cfg(feature = "web")]
mod wasm;

// Re-export key types for Rust consumers
pub use audio_buffer::StereoBuffer;
pub use bridge::{ControlHandle, EngineHandle, EngineReadback, create_bridge};
pub use config::{EngineConfig, StartError};
pub use dsp::ChorusMode;
pub use engine::JunoDspEngine;
pub use event::Event;
pub use module::{HostValue, InvokeError, JunoEngineModule, ModuleError, NativeModule, Promise};
pub use native::{AudioRenderer, GlobalEngine, JunoAudioEngine, LoadError, NativeEngine};
pub use package::{HostContext, JunoEnginePackage, ModulePackage, ModuleRegistry};
pub use parameter::ParamId;
pub use patch::{JunoPatch, PatchError};

#[cfg(feature = "web")]
pub use wasm::WebJunoEngine;
