//! Listener registry for stretch notifications.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Receives stretch gesture notifications.
///
/// Live drags and the animated spring-back go through the same calls, so a listener can't tell
/// them apart until [`on_stretch_end`](Self::on_stretch_end).
pub trait StretchListener {
    /// Called on every new stretch distance.
    ///
    /// `start_y` is the position the gesture started at, `distance` is the damped distance
    /// stretched from it.
    fn on_stretch(&mut self, start_y: f64, distance: f64);

    /// Called when a stretch gesture starts.
    fn on_stretch_start(&mut self);

    /// Called when a stretch gesture ends.
    ///
    /// `unstretched` is `true` if the gesture ended through the spring-back.
    fn on_stretch_end(&mut self, unstretched: bool);
}

impl<T: StretchListener + ?Sized> StretchListener for Rc<RefCell<T>> {
    fn on_stretch(&mut self, start_y: f64, distance: f64) {
        self.borrow_mut().on_stretch(start_y, distance);
    }

    fn on_stretch_start(&mut self) {
        self.borrow_mut().on_stretch_start();
    }

    fn on_stretch_end(&mut self, unstretched: bool) {
        self.borrow_mut().on_stretch_end(unstretched);
    }
}

/// Handle returned when registering a listener, used to unregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listeners in registration order.
#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Box<dyn StretchListener>)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn StretchListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub fn unregister(&mut self, id: ListenerId) -> Option<Box<dyn StretchListener>> {
        let idx = self.entries.iter().position(|(x, _)| *x == id)?;
        Some(self.entries.remove(idx).1)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn notify_start(&mut self) {
        for (_, listener) in &mut self.entries {
            listener.on_stretch_start();
        }
    }

    pub(crate) fn notify_stretch(&mut self, start_y: f64, distance: f64) {
        for (_, listener) in &mut self.entries {
            listener.on_stretch(start_y, distance);
        }
    }

    pub(crate) fn notify_end(&mut self, unstretched: bool) {
        for (_, listener) in &mut self.entries {
            listener.on_stretch_end(unstretched);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("next_id", &self.next_id)
            .field("ids", &self.entries.iter().map(|(id, _)| id).collect::<Vec<_>>())
            .finish()
    }
}
