//! Caller-driven timeout scheduling.
//!
//! A [`TimerEngine`] holds pending timers and fires the due ones whenever
//! the caller invokes [`TimerEngine::check`] with the current time. Time is a
//! plain `u64` in the caller's own unit, and the engine never reads a clock.
//!
//! Two backing strategies are available:
//!
//! - [`Strategy::Queue`]: an expiry-ordered list with O(1) insert and O(1)
//!   earliest-due lookup, valid when timers are added in non-decreasing
//!   expiry order (for example every timer uses the same timeout).
//! - [`Strategy::Wheel`]: a hashed timing wheel that accepts any order,
//!   with a fixed number of spokes and a tick length of `resolution` units.
//!
//! ```
//! use tickwheel::{Timer, TimerEngine};
//!
//! struct Expire(u32);
//!
//! impl Timer for Expire {
//!     type Context = Vec<u32>;
//!
//!     fn fire(&mut self, _now: u64, expired: &mut Vec<u32>, _timers: &mut TimerEngine<Self>) {
//!         expired.push(self.0);
//!     }
//! }
//!
//! let mut timers = TimerEngine::wheel(64).unwrap();
//! timers.add(0, 30, Expire(1)).unwrap();
//! timers.add(0, 10, Expire(2)).unwrap();
//!
//! let mut expired = Vec::new();
//! assert_eq!(timers.check(10, usize::MAX, &mut expired), 1);
//! assert_eq!(timers.check(30, usize::MAX, &mut expired), 1);
//! assert_eq!(expired, vec![2, 1]);
//! ```

mod config;
mod error;
mod slot;
mod timer;
mod trace;

pub use config::{DEFAULT_RESOLUTION, DEFAULT_WHEEL_SIZE, MAX_WHEEL_SIZE, Strategy};
pub use error::{InsertError, TimerError};
pub use timer::{Callback, Stats, Timer, TimerEngine, TimerHandle};
pub use trace::init_tracing;
