//! Discrete-event substrate for the static-priority simulator.
//!
//! Simulated time is tokio time. Run the simulation on a current-thread
//! runtime with a paused clock (`#[tokio::test(start_paused = true)]`, or
//! `Builder::start_paused(true)`) and the clock jumps straight to the next
//! pending timer whenever every task is blocked, as a discrete-event
//! scheduler would. One simulated unit is one second of tokio time;
//! the timer wheel resolves deadlines to the millisecond.
//!
//! - [`SimClock`]   — `now()` in simulated units, `sleep`, `sleep_until`
//! - [`Store`]      — shared FIFO: `put` never blocks, `get` suspends
//! - [`WorkSignal`] — single-slot wakeup that coalesces repeated signals
//!
//! # Quick start
//!
//! ```rust
//! use spq_sim::{SimClock, Store};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let clock = SimClock::start();
//!     let store: Store<u32> = Store::new();
//!     store.put(7);
//!     assert_eq!(store.get().await, 7);
//!     assert!(clock.now() >= 0.0);
//! }
//! ```

mod clock;
mod signal;
mod store;

// --- public API
pub use clock::SimClock;
pub use signal::WorkSignal;
pub use store::Store;
