#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Single-threaded countdown latches with error aggregation and pooled reuse.
//!
//! A [`Latch`] coordinates a fan-out/fan-in operation: the owner registers pending units of
//! work ("holds"), hands the [`Release`] tokens to whatever performs the work and registers a
//! completion callback. The callback runs exactly once, after every hold has been released,
//! and receives every error reported along the way in the order the reports arrived.
//!
//! ```
//! use holdfast::{LatchPool, TickQueue};
//!
//! let queue = TickQueue::new();
//! let pool = LatchPool::new(queue.clone());
//!
//! let latch = pool.acquire();
//!
//! let holds = (0..3).map(|_| latch.hold()).collect::<Vec<_>>();
//!
//! latch.go(|outcome| match outcome {
//!     Ok(()) => println!("all done"),
//!     Err(errors) => {
//!         for error in &errors {
//!             println!("hold {} failed: {error}", error.slot());
//!         }
//!     }
//! });
//!
//! holds[0].release();
//! holds[1].fail("connection reset");
//! holds[2].release();
//!
//! // The callback is deferred until the host runs its queue.
//! queue.run_until_idle();
//! ```
//!
//! # Guarantees
//!
//! * The completion callback runs at most once per latch use, and exactly once if one was
//!   registered and all holds get released.
//! * The completion callback never runs inside the call that released the last hold. It is
//!   handed to a [`Scheduler`] that runs it after the current call stack has unwound.
//! * Nothing panics across the hold/release boundary. Releasing twice, releasing after
//!   completion and requesting holds after completion are silently absorbed. Requesting more
//!   than [`MAX_HOLDS`] holds is reported as an error to the completion callback.
//! * Latch state is recycled through a [`LatchPool`]. Handles from an earlier use of a
//!   recycled state cannot affect the current use.
//!
//! # Threading
//!
//! All types in this crate are single-threaded (`!Send`, `!Sync`). Cross-thread
//! coordination is out of scope.

mod builder;
mod completion;
mod epoch;
mod errors;
mod latch;
mod latch_pool;
mod pool;
mod release;
mod scheduler;
mod slots;
mod state;

pub use builder::*;
pub use completion::*;
pub(crate) use epoch::*;
pub use errors::*;
pub use latch::*;
pub(crate) use latch_pool::PoolCore;
pub use latch_pool::LatchPool;
pub(crate) use pool::*;
pub use release::*;
pub use scheduler::*;
pub(crate) use slots::SlotSet;
pub use slots::{MAX_HOLDS, SLOT_CAPACITY, SlotId};
pub(crate) use state::*;
