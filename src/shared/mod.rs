pub mod fs_atomic;
pub mod logging;
pub mod retry;

pub use fs_atomic::{atomic_write_file, canonicalize_existing};
pub use logging::{LogLevel, LogQueue};
pub use retry::retry_io;
