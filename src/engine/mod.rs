//! Engine layer: per-tournament clock state machine, cancellable timer
//! handles, the clock registry, and the command service.

pub mod clock_engine;
pub mod registry;
pub mod service;
pub mod timers;

pub use clock_engine::TournamentClock;
pub use registry::{ClockEntry, ClockRegistry};
pub use service::ClockService;
pub use timers::TimerSet;
