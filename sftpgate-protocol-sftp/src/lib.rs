mod client;
mod ensure;
mod known_hosts;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use client::*;
pub use ensure::ensure_directories;
pub use known_hosts::{KnownHostValidationResult, KnownHosts};
