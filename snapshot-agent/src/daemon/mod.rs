//! Long-running mode: repeat backups on an interval until signalled.

pub mod scheduler;
pub mod shutdown;

pub use scheduler::run_every;
pub use shutdown::ShutdownCoordinator;
