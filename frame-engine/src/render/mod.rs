//! Render list handoff
//!
//! Systems in the LATE phase describe the frame as a list of backend-agnostic
//! [`Primitive`]s. The engine double-buffers those lists so the presentation
//! consumer always sees a complete frame.

pub mod buffer;
pub mod list;
pub mod primitive;

pub use buffer::{PresentNotice, RenderBuffers, DEFAULT_NOTIFY_CAPACITY};
pub use list::RenderList;
pub use primitive::{Color, Primitive, Shape};
