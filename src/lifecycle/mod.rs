//! Lifecycle coordination: startup order is plain code in `main`; shutdown
//! is a broadcast signal every long-running task subscribes to.

pub mod shutdown;

pub use shutdown::Shutdown;
