//! Regionshot Overlay Library
//!
//! Fullscreen region-selection overlay: one window per display showing a
//! dimmed screenshot, with mouse and key input routed back to the caller.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    renderer                         │
//! │        OpenGlRenderer (RegionRenderer trait)        │
//! │      (public API, blocking calls to the executor)   │
//! ├─────────────────────────────────────────────────────┤
//! │                    executor                         │
//! │            Executor / MainThread handle             │
//! │    (single thread owning GLFW and every GL object)  │
//! ├──────────────┬──────────────┬───────────────────────┤
//! │  platform/   │   texture    │       pipeline        │
//! │ GLFW windows │ GPU textures │  shader + quad draw   │
//! │  displays    │   handles    │                       │
//! ├──────────────┴──────────────┴───────────────────────┤
//! │                    input                            │
//! │       native events -> press/release/key callbacks  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Callbacks run on the executor thread inside `poll_events`. They must not
//! call back into the renderer; that blocks the executor on itself.

pub mod crash;
pub mod displays;
pub mod error;
pub mod executor;
pub mod input;
mod pipeline;
pub mod platform;
pub mod renderer;
mod texture;

// Re-export commonly used types
pub use crash::{CrashReporter, LogCrashReporter};
pub use displays::{MonitorInfo, match_monitors};
pub use error::RendererError;
pub use executor::{Executor, ExecutorError, MainThread};
pub use input::{InputEvent, KeyCallback, MouseCallback};
pub use renderer::{OpenGlRenderer, RegionRenderer};
pub use texture::Texture;

pub use regionshot_types::{MonitorBinding, RawImage, Rect, SelectorConfig};
