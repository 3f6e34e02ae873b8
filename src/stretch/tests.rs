use std::cell::RefCell;
use std::rc::Rc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use calloop::EventLoop;
use insta::assert_debug_snapshot;
use tracing_subscriber::EnvFilter;

use super::*;
use crate::input::PointerEvent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Start,
    Stretch { start_y: f64, distance: f64 },
    End { unstretched: bool },
}

impl Event {
    pub fn distance(&self) -> f64 {
        match self {
            Event::Stretch { distance, .. } => *distance,
            other => panic!("expected a stretch, got {other:?}"),
        }
    }
}

/// Listener that records everything it receives, along with the receiving thread.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Rc<RefCell<Vec<Event>>>,
    threads: Rc<RefCell<Vec<ThreadId>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Event> {
        self.threads.borrow_mut().clear();
        self.events.take()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
        self.threads.borrow_mut().push(thread::current().id());
    }
}

impl StretchListener for Recorder {
    fn on_stretch(&mut self, start_y: f64, distance: f64) {
        self.push(Event::Stretch { start_y, distance });
    }

    fn on_stretch_start(&mut self) {
        self.push(Event::Start);
    }

    fn on_stretch_end(&mut self, unstretched: bool) {
        self.push(Event::End { unstretched });
    }
}

struct State {
    stretcher: Stretcher<State>,
}

impl StretchHandler for State {
    fn stretcher(&mut self) -> &mut Stretcher<Self> {
        &mut self.stretcher
    }
}

struct Fixture {
    event_loop: EventLoop<'static, State>,
    state: State,
    recorder: Recorder,
}

impl Fixture {
    fn new(options: StretchOptions) -> Self {
        init_logging();

        let event_loop = EventLoop::try_new().unwrap();
        let mut stretcher = Stretcher::new(event_loop.handle(), options);
        let recorder = Recorder::new();
        stretcher.register_listener(Box::new(recorder.clone()));

        Self {
            event_loop,
            state: State { stretcher },
            recorder,
        }
    }

    fn stretcher(&mut self) -> &mut Stretcher<State> {
        &mut self.state.stretcher
    }

    fn dispatch_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            self.event_loop
                .dispatch(Some(Duration::from_millis(1)), &mut self.state)
                .unwrap();
        }
    }

    /// Dispatches until the gesture is over.
    fn dispatch_until_idle(&mut self) -> Duration {
        let start = Instant::now();
        while self.state.stretcher.is_stretching() {
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "gesture did not end: {:?}",
                self.state.stretcher
            );
            self.event_loop
                .dispatch(Some(Duration::from_millis(5)), &mut self.state)
                .unwrap();
        }
        // Let the idle callbacks clean up.
        self.event_loop
            .dispatch(Some(Duration::ZERO), &mut self.state)
            .unwrap();
        start.elapsed()
    }

    fn verify_invariants(&self) {
        self.state.stretcher.tracker.verify_invariants();
        assert_eq!(
            self.state.stretcher.unstretch.is_some(),
            self.state.stretcher.is_unstretching()
        );
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn slow_options() -> StretchOptions {
    StretchOptions {
        unstretch_speed: 1.,
        animation_timeout: Duration::from_millis(150),
        ..StretchOptions::default()
    }
}

fn assert_unstretch_ends_at_zero(events: &[Event]) {
    let (last, stretches) = events.split_last().unwrap();
    assert_eq!(*last, Event::End { unstretched: true });

    let distances: Vec<f64> = stretches.iter().map(Event::distance).collect();
    assert!(!distances.is_empty());
    assert!(
        distances.windows(2).all(|w| w[0] >= w[1]),
        "stretch must not increase while unstretching: {distances:?}"
    );
    assert_eq!(distances.last(), Some(&0.));
}

#[test]
fn release_springs_back() {
    let mut f = Fixture::new(StretchOptions::default());
    let stretcher = f.stretcher();
    stretcher.start_stretching(0.);
    stretcher.feed_move(100.);
    stretcher.stop_stretching(true);
    f.verify_invariants();

    assert!(f.state.stretcher.is_stretching());
    assert!(f.state.stretcher.is_unstretching());

    let events = f.recorder.take();
    assert_eq!(events[0], Event::Start);
    assert_eq!(events.len(), 2);

    let elapsed = f.dispatch_until_idle();
    f.verify_invariants();
    assert!(elapsed < f.state.stretcher.options().animation_timeout);

    let events = f.recorder.take();
    assert_unstretch_ends_at_zero(&events);
    for event in &events[..events.len() - 1] {
        let Event::Stretch { start_y, distance } = *event else {
            unreachable!()
        };
        assert_eq!(start_y, 0.);
        assert!(distance < 100f64.powf(0.88));
    }
    assert_eq!(f.state.stretcher.state().stretch_y, 0.);
}

#[test]
fn timeout_forces_the_end() {
    let mut f = Fixture::new(slow_options());
    let stretcher = f.stretcher();
    stretcher.start_stretching(0.);
    stretcher.feed_move(1000.);
    let start = Instant::now();
    stretcher.stop_stretching(true);
    f.recorder.take();

    f.dispatch_until_idle();
    f.verify_invariants();
    assert!(start.elapsed() >= Duration::from_millis(150));

    let events = f.recorder.take();
    assert_unstretch_ends_at_zero(&events);
    // At 1 px/s nothing but the forced end brings it to zero.
    assert!(events[0].distance() > 0.);
}

#[test]
fn notifications_arrive_on_the_event_loop_thread() {
    let mut f = Fixture::new(StretchOptions::default());
    let stretcher = f.stretcher();
    stretcher.start_stretching(0.);
    stretcher.feed_move(300.);
    stretcher.stop_stretching(true);
    f.dispatch_until_idle();

    let current = thread::current().id();
    assert!(f.recorder.threads.borrow().iter().all(|id| *id == current));
    assert!(f.recorder.events().len() > 3);
}

#[test]
fn off_finishes_right_away() {
    let mut f = Fixture::new(StretchOptions {
        off: true,
        ..StretchOptions::default()
    });
    let stretcher = f.stretcher();
    stretcher.start_stretching(20.);
    stretcher.feed_move(21.);
    stretcher.stop_stretching(true);
    f.verify_invariants();

    assert!(!f.state.stretcher.is_stretching());
    assert_debug_snapshot!(f.recorder.take(), @r"
    [
        Start,
        Stretch {
            start_y: 20.0,
            distance: 1.0,
        },
        Stretch {
            start_y: 20.0,
            distance: 0.0,
        },
        End {
            unstretched: true,
        },
    ]
    ");
}

#[test]
fn start_during_unstretch_cancels_it() {
    let mut f = Fixture::new(StretchOptions {
        animation_timeout: Duration::from_secs(10),
        ..slow_options()
    });
    let stretcher = f.stretcher();
    stretcher.start_stretching(0.);
    stretcher.feed_move(1000.);
    stretcher.stop_stretching(true);
    f.dispatch_for(Duration::from_millis(30));
    f.recorder.take();

    f.stretcher().start_stretching(50.);
    f.verify_invariants();
    assert_eq!(
        f.recorder.take(),
        [Event::End { unstretched: true }, Event::Start]
    );

    // Nothing from the old spring-back leaks into the new gesture.
    f.dispatch_for(Duration::from_millis(50));
    assert!(f.recorder.take().is_empty());
    assert!(!f.state.stretcher.is_unstretching());
    assert_eq!(
        *f.state.stretcher.state(),
        GestureState {
            active: true,
            start_y: 50.,
            current_delta_y: 0.,
            stretch_y: 0.,
        }
    );

    f.stretcher().feed_move(51.);
    assert_eq!(
        f.recorder.take(),
        [Event::Stretch {
            start_y: 50.,
            distance: 1.
        }]
    );
}

#[test]
fn stop_without_animation_cancels_unstretch() {
    let mut f = Fixture::new(StretchOptions {
        animation_timeout: Duration::from_secs(10),
        ..slow_options()
    });
    let stretcher = f.stretcher();
    stretcher.start_stretching(0.);
    stretcher.feed_move(100.);
    stretcher.stop_stretching(true);
    f.recorder.take();

    f.stretcher().stop_stretching(false);
    f.verify_invariants();
    assert_eq!(f.recorder.take(), [Event::End { unstretched: false }]);

    f.dispatch_for(Duration::from_millis(30));
    assert!(f.recorder.take().is_empty());
}

#[test]
fn unstretch_requests_without_stretch_are_ignored() {
    let mut f = Fixture::new(StretchOptions::default());
    f.stretcher().stop_stretching(true);
    assert!(f.recorder.take().is_empty());

    let stretcher = f.stretcher();
    stretcher.start_stretching(0.);
    stretcher.feed_move(100.);
    stretcher.stop_stretching(true);
    let id = stretcher.unstretch.as_ref().unwrap().id();

    // A second release while springing back doesn't start another run.
    f.stretcher().stop_stretching(true);
    assert_eq!(f.state.stretcher.unstretch.as_ref().unwrap().id(), id);

    f.dispatch_until_idle();
    let ends = f
        .recorder
        .take()
        .into_iter()
        .filter(|event| matches!(event, Event::End { .. }))
        .count();
    assert_eq!(ends, 1);
}

#[test]
fn gestures_can_repeat() {
    let mut f = Fixture::new(StretchOptions::default());

    for start_y in [0., 40., 80.] {
        let stretcher = f.stretcher();
        stretcher.start_stretching(start_y);
        stretcher.feed_move(start_y + 60.);
        stretcher.stop_stretching(true);
        f.dispatch_until_idle();
        f.verify_invariants();

        let events = f.recorder.take();
        assert_eq!(events[0], Event::Start);
        assert_eq!(events[1].distance(), 60f64.powf(0.88));
        assert_unstretch_ends_at_zero(&events[2..]);
    }
}

#[test]
fn pointer_events_drive_the_gesture() {
    let mut f = Fixture::new(StretchOptions::default());
    let stretcher = f.stretcher();

    // Nothing happens until the host starts a gesture.
    assert!(!stretcher.handle_pointer_event(PointerEvent::Press { y: 10. }));
    assert!(!stretcher.handle_pointer_event(PointerEvent::Move { y: 20. }));
    assert!(!stretcher.handle_pointer_event(PointerEvent::Release { y: 20. }));
    assert!(!stretcher.handle_pointer_event(PointerEvent::Cancel));

    stretcher.start_stretching(10.);
    assert!(stretcher.handle_pointer_event(PointerEvent::Move { y: 11. }));
    assert!(stretcher.handle_pointer_event(PointerEvent::Release { y: 11. }));
    assert!(stretcher.is_unstretching());
    // Moves don't reach the spring-back.
    assert!(!stretcher.handle_pointer_event(PointerEvent::Move { y: 300. }));

    f.dispatch_until_idle();
    assert_unstretch_ends_at_zero(&f.recorder.take()[2..]);
}

#[test]
fn pointer_cancel_springs_back() {
    let mut f = Fixture::new(StretchOptions::default());
    let stretcher = f.stretcher();
    stretcher.start_stretching(0.);
    stretcher.handle_pointer_event(PointerEvent::Move { y: 50. });
    assert!(stretcher.handle_pointer_event(PointerEvent::Cancel));
    assert!(stretcher.is_unstretching());
    f.dispatch_until_idle();
    assert!(!f.state.stretcher.is_stretching());
}

#[test]
fn pointer_press_interrupts_unstretch() {
    let mut f = Fixture::new(StretchOptions {
        animation_timeout: Duration::from_secs(10),
        ..slow_options()
    });
    let stretcher = f.stretcher();
    stretcher.start_stretching(0.);
    stretcher.feed_move(100.);
    stretcher.handle_pointer_event(PointerEvent::Release { y: 100. });
    f.recorder.take();

    assert!(f
        .stretcher()
        .handle_pointer_event(PointerEvent::Press { y: 5. }));
    f.verify_invariants();
    assert!(!f.state.stretcher.is_stretching());
    assert_eq!(f.recorder.take(), [Event::End { unstretched: true }]);
}

#[test]
fn moving_above_start_ends_without_spring_back() {
    let mut f = Fixture::new(StretchOptions::default());
    let stretcher = f.stretcher();
    stretcher.start_stretching(100.);
    stretcher.handle_pointer_event(PointerEvent::Move { y: 90. });
    f.verify_invariants();

    assert!(!f.state.stretcher.is_stretching());
    assert!(f.state.stretcher.unstretch.is_none());
    assert_eq!(
        f.recorder.take(),
        [Event::Start, Event::End { unstretched: false }]
    );
}

#[test]
fn unregistered_listener_stops_receiving() {
    let mut f = Fixture::new(StretchOptions::default());
    let other = Recorder::new();
    let id = f.stretcher().register_listener(Box::new(other.clone()));

    f.stretcher().start_stretching(0.);
    assert!(f.stretcher().unregister_listener(id).is_some());
    f.stretcher().feed_move(1.);

    assert_eq!(other.take(), [Event::Start]);
    assert_eq!(f.recorder.take().len(), 2);
}

#[test]
fn options_apply_to_the_next_move() {
    let mut f = Fixture::new(StretchOptions::default());
    f.stretcher().start_stretching(0.);
    f.stretcher().set_options(StretchOptions {
        exponent: 0.5,
        ..StretchOptions::default()
    });
    f.verify_invariants();
    f.stretcher().feed_move(16.);
    f.verify_invariants();

    assert_abs_diff_eq!(f.recorder.take()[1].distance(), 4.);
}

#[test]
fn degenerate_positions() {
    let mut f = Fixture::new(slow_options());
    f.stretcher().start_stretching(0.);
    f.stretcher().feed_move(f64::NAN);
    f.verify_invariants();
    assert_eq!(
        f.recorder.take(),
        [
            Event::Start,
            Event::Stretch {
                start_y: 0.,
                distance: 0.
            }
        ]
    );

    f.stretcher().feed_move(f64::INFINITY);
    f.verify_invariants();
    assert_eq!(f.recorder.take()[0].distance(), f64::INFINITY);

    // No finite speed brings an infinite stretch down, only the timeout does.
    let start = Instant::now();
    f.stretcher().stop_stretching(true);
    f.dispatch_until_idle();
    f.verify_invariants();
    assert!(start.elapsed() >= Duration::from_millis(150));

    let events = f.recorder.take();
    assert_unstretch_ends_at_zero(&events);
    let (_, stretches) = events.split_last().unwrap();
    assert!(stretches[..stretches.len() - 1]
        .iter()
        .all(|event| event.distance() == f64::INFINITY));
}
