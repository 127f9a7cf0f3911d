//! Countdown clocks for Gridlock game rooms.
//!
//! A [`Countdown`] ticks down from a configured duration at one-second
//! resolution, yielding a tick event per elapsed second and exactly one
//! terminal expiry event, after which it goes idle.
//!
//! # Pull, don't push
//!
//! The countdown never spawns a timer task and never fires a callback.
//! Its single owner — a game-room actor — polls [`Countdown::next_event`]
//! inside its `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         event = turn_clock.next_event() => { /* tick or expiry */ }
//!     }
//! }
//! ```
//!
//! Because ticks are pulled through the owner's serialization point,
//! `reset`/`cancel` cannot race an in-flight tick: once the owner calls
//! [`Countdown::cancel`], no tick or expiry from the old run can ever be
//! observed. While idle (never started, cancelled, or expired) the
//! `next_event` future pends forever, which is exactly what `select!`
//! wants from an inactive branch.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::trace;

/// One second per tick. The wire contract is `SecondPassed { remaining }`,
/// so sub-second resolution would buy nothing.
const TICK: Duration = Duration::from_secs(1);

/// An event yielded by [`Countdown::next_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// One second elapsed; `remaining` seconds are left.
    Tick {
        /// Whole seconds left on the clock after this tick.
        remaining: u64,
    },

    /// The clock reached zero. Emitted at most once per `start`; the
    /// countdown is idle afterwards.
    Expired,
}

/// Internal clock state.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Not ticking. `next_event` pends forever.
    Idle,
    /// Ticking down. `next_tick` is when the next whole second elapses.
    Running { remaining: u64, next_tick: Instant },
}

/// A cancellable, resettable countdown clock.
///
/// One `Countdown` paces exactly one purpose: a game room owns one for the
/// main turn clock and a second one for combat rounds. Starting an
/// already-running countdown is an implicit reset — one logical clock can
/// never tick twice in parallel.
#[derive(Debug)]
pub struct Countdown {
    state: State,
}

impl Countdown {
    /// Creates an idle countdown.
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    /// Starts ticking down from `duration`, rounded up to whole seconds.
    ///
    /// If the clock is already running this is an implicit reset: the old
    /// run is discarded and no event from it will ever be yielded. A zero
    /// duration expires on the next poll without emitting a tick.
    pub fn start(&mut self, duration: Duration) {
        let mut remaining = duration.as_secs();
        if duration.subsec_nanos() > 0 {
            remaining += 1;
        }
        self.state = State::Running {
            remaining,
            next_tick: Instant::now() + TICK,
        };
        trace!(remaining, "countdown started");
    }

    /// Restarts the clock at `duration`. Same as [`start`](Self::start);
    /// provided for call-site readability when a clock is known to be
    /// running.
    pub fn reset(&mut self, duration: Duration) {
        self.start(duration);
    }

    /// Stops the clock without emitting an expiry. Idempotent; safe to
    /// call whether or not the clock is running.
    pub fn cancel(&mut self) {
        if matches!(self.state, State::Running { .. }) {
            trace!("countdown cancelled");
        }
        self.state = State::Idle;
    }

    /// Whether the clock is currently ticking.
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Whole seconds left, or `None` when idle.
    pub fn remaining(&self) -> Option<u64> {
        match self.state {
            State::Idle => None,
            State::Running { remaining, .. } => Some(remaining),
        }
    }

    /// Waits for the next clock event.
    ///
    /// Yields [`CountdownEvent::Tick`] once per elapsed second and
    /// [`CountdownEvent::Expired`] when the clock reaches zero, going idle
    /// afterwards. While idle this future pends forever — `select!` will
    /// simply service its other branches.
    pub async fn next_event(&mut self) -> CountdownEvent {
        let (remaining, next_tick) = match self.state {
            State::Running { remaining, next_tick } => (remaining, next_tick),
            State::Idle => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        if remaining == 0 {
            self.state = State::Idle;
            return CountdownEvent::Expired;
        }

        time::sleep_until(next_tick).await;

        let remaining = remaining - 1;
        if remaining == 0 {
            self.state = State::Idle;
            trace!("countdown expired");
            CountdownEvent::Expired
        } else {
            self.state = State::Running {
                remaining,
                next_tick: next_tick + TICK,
            };
            CountdownEvent::Tick { remaining }
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}
