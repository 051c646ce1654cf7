//! Logging utilities.
//!
//! - one-time `env_logger` initialization behind the `log` facade
//! - the throttled sink for GPU driver messages
//! - the `critical!` macro for contract violations

mod debug;
mod init;

pub use debug::{DebugMessageLog, DebugSeverity, DebugSource, ThrottleDecision};
pub use init::{init_logging, LoggingConfig};
