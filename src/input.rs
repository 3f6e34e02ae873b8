//! Pointer events forwarded by the host surface.

use crate::stretch::{StretchHandler, Stretcher};
use crate::Phase;

/// A single-pointer contact event with its vertical position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Press { y: f64 },
    Move { y: f64 },
    Release { y: f64 },
    Cancel,
}

impl<D: StretchHandler> Stretcher<D> {
    /// Observes a pointer event.
    ///
    /// Pressing does not start a gesture by itself, the host decides when to call
    /// [`start_stretching`](Self::start_stretching). A press does stop an ongoing spring-back
    /// though. Releasing or cancelling springs the gesture back.
    ///
    /// Returns `true` if the event changed the gesture. The host should keep processing the event
    /// either way.
    pub fn handle_pointer_event(&mut self, event: PointerEvent) -> bool {
        match event {
            PointerEvent::Press { .. } => {
                if self.phase() != Phase::Unstretching {
                    return false;
                }
                self.cancel_unstretch();
                true
            }
            PointerEvent::Move { y } => {
                if self.phase() != Phase::Stretching {
                    return false;
                }
                self.feed_move(y);
                true
            }
            PointerEvent::Release { .. } | PointerEvent::Cancel => {
                if self.phase() != Phase::Stretching {
                    return false;
                }
                self.stop_stretching(true);
                true
            }
        }
    }
}
