//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! Shutdown is ordered (stop accept, drain, close) with a drain deadline
//! after which remaining connections are force-closed.

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
