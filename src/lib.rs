//! Vertical stretch gesture tracking.
//!
//! [`Stretcher`] turns pointer events into a damped stretch distance and springs it back to zero
//! once the gesture is released. Listeners registered on it receive the start, every stretch
//! update and the end of each gesture, always on the thread running the calloop event loop.

#[macro_use]
extern crate tracing;

pub mod input;
pub mod stretch;

pub use input::PointerEvent;
pub use stretch::listener::{ListenerId, StretchListener};
pub use stretch::options::StretchOptions;
pub use stretch::tracker::{damp, GestureState, Phase, StretchTracker};
pub use stretch::{StretchHandler, Stretcher};
