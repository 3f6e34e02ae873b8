//! Stretch gesture state machine.

use std::time::Duration;

use super::listener::{ListenerId, Listeners, StretchListener};
use super::options::StretchOptions;

/// Spring-back tick intervals outside of this range are replaced with
/// [`DEFAULT_TICK_INTERVAL`].
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);
pub const MAX_TICK_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Damps a raw displacement into the reported stretch distance.
///
/// The curve is concave for exponents in `(0, 1)`, so the stretch grows slower than the
/// pointer moves. Zero, negative and NaN displacements give zero.
pub fn damp(delta: f64, exponent: f64) -> f64 {
    if delta > 0. {
        delta.powf(exponent)
    } else {
        0.
    }
}

fn sanitize_tick_interval(interval: Option<Duration>) -> Duration {
    match interval {
        Some(interval) if (MIN_TICK_INTERVAL..=MAX_TICK_INTERVAL).contains(&interval) => interval,
        _ => DEFAULT_TICK_INTERVAL,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GestureState {
    /// Whether a gesture is ongoing, including its spring-back.
    pub active: bool,
    /// Pointer position the gesture started at.
    pub start_y: f64,
    /// Raw displacement from `start_y`, never negative.
    pub current_delta_y: f64,
    /// Damped `current_delta_y`, as last reported to the listeners.
    pub stretch_y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Stretching,
    Unstretching,
}

/// Tracks one stretch gesture at a time and notifies the listeners about it.
///
/// The tracker does not keep time. The spring-back is driven from the outside through
/// [`unstretch_step`](Self::unstretch_step), see [`Stretcher`](super::Stretcher).
#[derive(Debug)]
pub struct StretchTracker {
    state: GestureState,
    phase: Phase,
    listeners: Listeners,
    options: StretchOptions,
}

impl StretchTracker {
    pub fn new(options: StretchOptions) -> Self {
        Self {
            state: GestureState::default(),
            phase: Phase::Idle,
            listeners: Listeners::new(),
            options,
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn options(&self) -> &StretchOptions {
        &self.options
    }

    /// Replaces the options. An ongoing gesture is re-damped with the new exponent, the
    /// listeners see it on the next report.
    pub fn set_options(&mut self, options: StretchOptions) {
        self.options = options;
        if self.phase != Phase::Idle {
            self.state.stretch_y = damp(self.state.current_delta_y, self.options.exponent);
        }
    }

    pub fn register_listener(&mut self, listener: Box<dyn StretchListener>) -> ListenerId {
        self.listeners.register(listener)
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> Option<Box<dyn StretchListener>> {
        self.listeners.unregister(id)
    }

    /// Returns `true` from the gesture start until its end, spring-back included.
    pub fn is_stretching(&self) -> bool {
        self.state.active
    }

    /// Starts a new gesture at `y`.
    ///
    /// Starting while a gesture is ongoing moves its start point. Callers should end the previous
    /// gesture first.
    pub fn start(&mut self, y: f64) {
        if self.phase != Phase::Idle {
            debug!("restarting stretch gesture in {:?} at y={y}", self.phase);
        }

        self.state = GestureState {
            active: true,
            start_y: y,
            current_delta_y: 0.,
            stretch_y: 0.,
        };
        self.phase = Phase::Stretching;

        trace!("stretch started at y={y}");
        self.listeners.notify_start();
    }

    /// Feeds a new pointer position of the ongoing gesture.
    ///
    /// Moving back above the start point ends the gesture without a spring-back.
    pub fn feed_move(&mut self, y: f64) {
        if self.phase != Phase::Stretching {
            return;
        }

        if y < self.state.start_y {
            trace!("pointer moved above the stretch start, ending");
            self.end();
            return;
        }

        self.state.current_delta_y = (y - self.state.start_y).max(0.);
        self.report_stretch();
    }

    /// Ends the gesture without a spring-back.
    pub fn end(&mut self) {
        self.listeners.notify_end(false);
        self.reset();
    }

    /// Switches an ongoing gesture to the spring-back.
    ///
    /// Returns the displacement to spring back from, or `None` if there's no gesture being
    /// stretched.
    pub fn begin_unstretch(&mut self) -> Option<f64> {
        if self.phase != Phase::Stretching {
            return None;
        }

        self.phase = Phase::Unstretching;
        trace!("unstretching from {}", self.state.current_delta_y);
        Some(self.state.current_delta_y)
    }

    /// Advances the spring-back by one tick lasting `interval`.
    ///
    /// Missing or out-of-range intervals count as [`DEFAULT_TICK_INTERVAL`]. Returns `true` once
    /// the spring-back has completed and the gesture has ended.
    pub fn unstretch_step(&mut self, interval: Option<Duration>) -> bool {
        if self.phase != Phase::Unstretching {
            return true;
        }

        let interval = sanitize_tick_interval(interval);
        let step = self.options.unstretch_speed * interval.as_secs_f64();
        self.state.current_delta_y = (self.state.current_delta_y - step).max(0.);
        self.report_stretch();

        if self.state.current_delta_y <= 0. {
            self.complete_unstretch();
            return true;
        }

        false
    }

    /// Completes the spring-back right away, reporting a zero stretch first.
    pub fn finish_unstretch(&mut self) {
        if self.phase != Phase::Unstretching {
            return;
        }

        self.state.current_delta_y = 0.;
        self.report_stretch();
        self.complete_unstretch();
    }

    /// Ends the spring-back where it is, without reporting a final stretch.
    pub fn interrupt_unstretch(&mut self) {
        if self.phase != Phase::Unstretching {
            return;
        }

        trace!("unstretch interrupted at {}", self.state.current_delta_y);
        self.complete_unstretch();
    }

    fn complete_unstretch(&mut self) {
        self.listeners.notify_end(true);
        self.reset();
    }

    fn report_stretch(&mut self) {
        self.state.stretch_y = damp(self.state.current_delta_y, self.options.exponent);
        self.listeners
            .notify_stretch(self.state.start_y, self.state.stretch_y);
    }

    fn reset(&mut self) {
        self.state.active = false;
        self.state.current_delta_y = 0.;
        self.state.stretch_y = 0.;
        self.phase = Phase::Idle;
    }

    #[cfg(test)]
    pub fn verify_invariants(&self) {
        let state = &self.state;

        assert_eq!(state.active, self.phase != Phase::Idle);
        assert!(
            state.current_delta_y >= 0.,
            "delta must not be negative: {}",
            state.current_delta_y
        );
        assert_eq!(
            state.stretch_y,
            damp(state.current_delta_y, self.options.exponent)
        );

        if !state.active {
            assert_eq!(state.current_delta_y, 0.);
            assert_eq!(state.stretch_y, 0.);
        }
    }
}
