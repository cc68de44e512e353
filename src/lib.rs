//! Interactive 3D object viewer for the portfolio pages.
//!
//! A [`ViewerRegistry`] owns any number of independent viewers, each a
//! labeled cube or a point-cloud icosphere rendered into its own canvas.
//! Viewers rotate on their own, can be dragged with inertia, show a tooltip
//! for the face under the pointer and report clicks as segment labels.
//!
//! The controller is platform-neutral: drawing goes through [`Renderer`],
//! host attachments through [`HostBinding`]. The browser build wires both
//! to wgpu and the DOM and exposes [`ViewerHost`](web::ViewerHost) to JS.

pub mod builder;
pub mod camera;
pub mod color;
pub mod config;
mod disposal;
pub mod error;
pub mod geometry;
pub mod headless;
pub mod interaction;
pub mod label;
pub mod performance;
pub mod raycast;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod theme;
pub mod tooltip;
pub mod types;

#[cfg(target_arch = "wasm32")]
mod utils;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use color::{Rgb, ThemeColors};
pub use config::{Segment, ShapeKind, SizeClass, Tuning, ViewerConfig, ViewerOptions};
pub use error::{Result, ViewerError};
pub use interaction::{InteractionState, PointerInput};
pub use registry::{FrameOutcome, InstanceParts, ViewerInstance, ViewerRegistry};
pub use render::{HostBinding, Renderer};
