//! Spring-back timing loop.
//!
//! The loop runs on its own thread and only keeps time. Every tick is sent over a calloop
//! channel to the event loop, which applies it to the tracker and notifies the listeners. The
//! next tick is not computed until the event loop reopens the ready gate, so there is at most
//! one tick in flight.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use calloop::channel::{self, Channel, SyncSender};
use calloop::{LoopHandle, RegistrationToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnstretchMsg {
    /// Time to advance the spring-back. Carries the time since the previous tick, if any.
    Tick(Option<Duration>),
    /// The spring-back ran out of time and must complete now.
    Timeout,
}

#[derive(Debug)]
struct GateState {
    /// Whether the previous tick has been handled.
    ready: bool,
    stopped: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Wait {
    Ready,
    TimedOut,
    Stopped,
}

/// Single-slot hand-off between the timing loop and the event loop.
#[derive(Debug)]
pub struct ReadyGate {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl ReadyGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                ready: true,
                stopped: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the last tick as handled.
    pub fn open(&self) {
        self.lock().ready = true;
        self.cond.notify_all();
    }

    /// Stops the timing loop before its next tick.
    pub fn stop(&self) {
        self.lock().stopped = true;
        self.cond.notify_all();
    }

    #[cfg(test)]
    fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Waits until the gate is open and `not_before` has passed, then closes the gate.
    fn wait(&self, not_before: Instant, deadline: Instant) -> Wait {
        let mut state = self.lock();
        loop {
            if state.stopped {
                return Wait::Stopped;
            }

            let now = Instant::now();
            if now >= deadline {
                return Wait::TimedOut;
            }

            if state.ready && now >= not_before {
                state.ready = false;
                return Wait::Ready;
            }

            let wake_at = if state.ready {
                not_before.min(deadline)
            } else {
                deadline
            };
            state = self
                .cond
                .wait_timeout(state, wake_at - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

fn run_timing_loop(
    gate: &ReadyGate,
    tx: &SyncSender<UnstretchMsg>,
    timeout: Duration,
    frame_interval: Duration,
) {
    let start = Instant::now();
    let deadline = start + timeout;
    let mut last_tick: Option<Instant> = None;

    loop {
        let not_before = last_tick.map_or(start, |last| last + frame_interval);
        match gate.wait(not_before, deadline) {
            Wait::Ready => (),
            Wait::Stopped => return,
            Wait::TimedOut => {
                trace!("unstretch timed out after {:?}", start.elapsed());
                // Doesn't wait for the gate, so this can queue behind an unhandled tick. If that
                // tick completes the run, the event loop drops this as coming from a retired run.
                // A send error means the event loop side is already gone.
                let _ = tx.send(UnstretchMsg::Timeout);
                return;
            }
        }

        let now = Instant::now();
        let interval = last_tick.map(|last| now - last);
        last_tick = Some(now);

        if tx.send(UnstretchMsg::Tick(interval)).is_err() {
            // The event loop side is gone.
            return;
        }
    }
}

/// One running spring-back.
#[derive(Debug)]
pub struct UnstretchRun {
    id: u64,
    started_at: Instant,
    gate: Arc<ReadyGate>,
    token: RegistrationToken,
}

impl UnstretchRun {
    /// Spawns the timing loop and registers its channel on the event loop.
    ///
    /// `on_msg` is called on the event loop for every message of this run.
    pub fn start<D: 'static>(
        event_loop: &LoopHandle<'static, D>,
        id: u64,
        timeout: Duration,
        frame_interval: Duration,
        mut on_msg: impl FnMut(u64, UnstretchMsg, &mut D) + 'static,
    ) -> anyhow::Result<Self> {
        let (tx, rx): (SyncSender<UnstretchMsg>, Channel<UnstretchMsg>) = channel::sync_channel(1);

        let token = event_loop
            .insert_source(rx, move |event, _, data| match event {
                channel::Event::Msg(msg) => on_msg(id, msg, data),
                channel::Event::Closed => (),
            })
            .map_err(|err| err.error)
            .context("error inserting the unstretch channel")?;

        let gate = Arc::new(ReadyGate::new());
        let gate_ = gate.clone();
        let res = thread::Builder::new()
            .name(format!("unstretch-{id}"))
            .spawn(move || run_timing_loop(&gate_, &tx, timeout, frame_interval));

        if let Err(err) = res {
            event_loop.remove(token);
            return Err(err).context("error spawning the unstretch thread");
        }

        debug!("started unstretch run {id}");
        Ok(Self {
            id,
            started_at: Instant::now(),
            gate,
            token,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Lets the timing loop compute the next tick.
    pub fn tick_handled(&self) {
        self.gate.open();
    }

    /// Stops the timing loop and unregisters the channel.
    ///
    /// The timing loop is stopped right away. The channel is removed from an idle callback since
    /// this may run inside the channel's own callback.
    pub fn retire<D: 'static>(self, event_loop: &LoopHandle<'static, D>) {
        self.gate.stop();
        debug!("retired unstretch run {} after {:?}", self.id, self.elapsed());

        let handle = event_loop.clone();
        let token = self.token;
        event_loop.insert_idle(move |_| handle.remove(token));
    }
}

impl Drop for UnstretchRun {
    fn drop(&mut self) {
        self.gate.stop();
    }
}
