//! # tourneyclock
//!
//! Event-sourced tournament clock engine.
//!
//! The engine is the single source of truth for elapsed/remaining time
//! across a multi-level, multi-break blind schedule. Every state
//! transition is durably recorded as an immutable, versioned fact before
//! memory changes, live state is rebuilt from that history by a pure
//! projection fold, and remote observers are kept within a bounded drift
//! of server time by a synchronization protocol.
//!
//! Durable storage and the network transport are external collaborators
//! behind traits: the crate ships in-memory reference stores and a
//! broadcast-channel notifier the gateway subscribes to.
//!
//! ## Architecture
//!
//! ```text
//! Commands (transport-agnostic RPCs)
//!     │
//!     ├── ClockService (engine/)
//!     │       ├── ClockRegistry + TournamentClock (engine/)
//!     │       ├── TimerSet: tick / warning / sync tasks (engine/)
//!     │       └── Time sync protocol (sync.rs)
//!     │
//!     ├── Projection fold (projection.rs)
//!     ├── EventStore / SnapshotStore (store/)
//!     │
//!     └── ClockNotifier → Broadcast Gateway (domain/)
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod projection;
pub mod store;
pub mod sync;
pub mod time;
