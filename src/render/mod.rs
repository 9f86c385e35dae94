//! Render module
//!
//! The display-synchronized loop that drives retargeting, plus the camera,
//! renderer capability and tick scheduling it runs on.

pub mod render_loop;
pub mod renderer;
pub mod scheduler;

pub use render_loop::{Phase, RenderLoop, TickError, TickOutcome, TickStage};
pub use renderer::{Camera, HeadlessRenderer, Renderer};
pub use scheduler::{Clock, IntervalScheduler, ManualClock, Scheduler, StepScheduler, SystemClock};
