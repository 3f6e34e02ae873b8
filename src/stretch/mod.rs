//! Stretch gesture wired to a calloop event loop.

use std::fmt;

use calloop::LoopHandle;

use self::listener::{ListenerId, StretchListener};
use self::options::StretchOptions;
use self::tracker::{GestureState, Phase, StretchTracker};
use self::unstretch::{UnstretchMsg, UnstretchRun};

pub mod listener;
pub mod options;
pub mod tracker;
pub mod unstretch;

#[cfg(test)]
pub(crate) mod tests;

/// Gives the spring-back access to the [`Stretcher`] stored in the event loop data.
pub trait StretchHandler: Sized + 'static {
    fn stretcher(&mut self) -> &mut Stretcher<Self>;
}

/// Stretch gesture tracker with an animated spring-back.
///
/// All methods must be called on the thread running the event loop behind `event_loop`, which
/// is also where the listeners get notified.
pub struct Stretcher<D> {
    tracker: StretchTracker,
    event_loop: LoopHandle<'static, D>,
    /// Spring-back in progress.
    unstretch: Option<UnstretchRun>,
    next_run_id: u64,
}

impl<D: StretchHandler> Stretcher<D> {
    pub fn new(event_loop: LoopHandle<'static, D>, options: StretchOptions) -> Self {
        Self {
            tracker: StretchTracker::new(options),
            event_loop,
            unstretch: None,
            next_run_id: 0,
        }
    }

    pub fn register_listener(&mut self, listener: Box<dyn StretchListener>) -> ListenerId {
        self.tracker.register_listener(listener)
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> Option<Box<dyn StretchListener>> {
        self.tracker.unregister_listener(id)
    }

    pub fn options(&self) -> &StretchOptions {
        self.tracker.options()
    }

    /// Updates the options.
    ///
    /// An ongoing gesture is re-damped with the new exponent. A spring-back in progress keeps its
    /// timing but uses the new speed.
    pub fn set_options(&mut self, options: StretchOptions) {
        self.tracker.set_options(options);
    }

    pub fn state(&self) -> &GestureState {
        self.tracker.state()
    }

    pub fn phase(&self) -> Phase {
        self.tracker.phase()
    }

    /// Returns `true` while a gesture is ongoing, including its spring-back.
    pub fn is_stretching(&self) -> bool {
        self.tracker.is_stretching()
    }

    pub fn is_unstretching(&self) -> bool {
        self.tracker.phase() == Phase::Unstretching
    }

    /// Starts observing a stretch gesture from `y`.
    ///
    /// An ongoing spring-back is stopped first and its gesture ends as unstretched.
    pub fn start_stretching(&mut self, y: f64) {
        self.cancel_unstretch();
        self.tracker.start(y);
    }

    pub fn feed_move(&mut self, y: f64) {
        self.tracker.feed_move(y);
    }

    /// Stops observing the stretch gesture.
    ///
    /// With `animate`, the stretch springs back to zero before the gesture ends. Otherwise the
    /// gesture ends right away.
    ///
    /// The two cases differ when nothing is being stretched: an animated stop does nothing while
    /// idle or already springing back, whereas a stop without animation always notifies
    /// `on_stretch_end(false)`, cancelling any spring-back.
    pub fn stop_stretching(&mut self, animate: bool) {
        if !animate {
            if let Some(run) = self.unstretch.take() {
                run.retire(&self.event_loop);
            }
            self.tracker.end();
            return;
        }

        if self.tracker.begin_unstretch().is_none() {
            trace!("ignoring unstretch request in {:?}", self.tracker.phase());
            return;
        }

        let options = *self.tracker.options();
        if options.off {
            self.tracker.finish_unstretch();
            return;
        }

        let id = self.next_run_id;
        self.next_run_id += 1;

        let res = UnstretchRun::start(
            &self.event_loop,
            id,
            options.animation_timeout,
            options.frame_interval,
            |id, msg, data: &mut D| data.stretcher().on_unstretch_msg(id, msg),
        );
        match res {
            Ok(run) => self.unstretch = Some(run),
            Err(err) => {
                warn!("error starting unstretch, finishing right away: {err:?}");
                self.tracker.finish_unstretch();
            }
        }
    }

    /// Stops an ongoing spring-back, ending its gesture without a final stretch.
    pub fn cancel_unstretch(&mut self) {
        if let Some(run) = self.unstretch.take() {
            run.retire(&self.event_loop);
        }
        self.tracker.interrupt_unstretch();
    }

    fn on_unstretch_msg(&mut self, id: u64, msg: UnstretchMsg) {
        let _span = tracy_client::span!("Stretcher::on_unstretch_msg");

        if self.unstretch.as_ref().map(UnstretchRun::id) != Some(id) {
            trace!("ignoring {msg:?} from retired unstretch run {id}");
            return;
        }

        let done = match msg {
            UnstretchMsg::Tick(interval) => self.tracker.unstretch_step(interval),
            UnstretchMsg::Timeout => {
                debug!("unstretch timed out, finishing");
                self.tracker.finish_unstretch();
                true
            }
        };

        if done {
            if let Some(run) = self.unstretch.take() {
                run.retire(&self.event_loop);
            }
        } else if let Some(run) = &self.unstretch {
            run.tick_handled();
        }
    }
}

impl<D> fmt::Debug for Stretcher<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stretcher")
            .field("tracker", &self.tracker)
            .field("unstretch", &self.unstretch)
            .field("next_run_id", &self.next_run_id)
            .finish_non_exhaustive()
    }
}
