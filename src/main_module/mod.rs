//! Process-level pieces: health checks, server startup and shutdown

mod health;
mod server;
mod shutdown;

pub use health::*;
pub use server::*;
pub use shutdown::*;
