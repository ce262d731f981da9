//! Application framework for the Trellis engine.
//!
//! This crate provides a trait-based application framework that handles
//! common boilerplate like:
//! - Logging initialisation
//! - Window creation and management
//! - GPU context initialization
//! - The swapchain frame loop and global descriptor resources
//! - Event loop handling
//!
//! # Example
//!
//! ```no_run
//! use trellis_app::{run_app, AppConfig, AppContext, FrameContext, TrellisApp};
//!
//! struct MyApp {
//!     // Application state
//! }
//!
//! impl TrellisApp for MyApp {
//!     fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp {})
//!     }
//!
//!     fn update(&mut self, ctx: &mut AppContext, dt: f32) {
//!         // Update logic
//!     }
//!
//!     fn render(&mut self, ctx: &AppContext, frame: &FrameContext) -> anyhow::Result<()> {
//!         // Record draws into frame.command_buffer
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::default())
//! }
//! ```

mod app;
mod config;
mod context;
mod frame;
mod runner;

pub use app::TrellisApp;
pub use config::AppConfig;
pub use context::AppContext;
pub use frame::FrameContext;
pub use runner::{init_logging, run_app};

// Re-export commonly used types for convenience
pub use trellis_gpu::{GpuContext, GpuContextBuilder};
pub use trellis_render::{Camera, RenderConfig};
pub use winit::event::{DeviceEvent, DeviceId, WindowEvent};
