//! Crate-wide error type and the debug/release assertion macro used for
//! programmer-error invariant violations (a destroyed handle reused, an
//! unknown resource block type, …): these panic in debug builds and log in
//! release rather than propagating as `Result`.

use crate::unit::UnitId;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)))]
pub enum WorldError {
    #[snafu(display("resource block type {block_type} has no subsystem route"))]
    UnknownComponentBlock { block_type: u32 },

    #[snafu(display("unit {unit:?} is not alive"))]
    UnitNotAlive { unit: UnitId },

    #[snafu(display("level resource {resource} is already loaded"))]
    LevelAlreadyLoaded { resource: u64 },

    #[snafu(display("level resource {resource} is not loaded"))]
    LevelNotLoaded { resource: u64 },

    #[snafu(display("script module {module} does not define {function}"))]
    ScriptFunctionMissing { module: String, function: String },
}

pub type WorldResult<T> = Result<T, WorldError>;

// Re-exported at the crate root as `embercore::tracing` so `debug_panic!`'s
// `$crate::tracing::error!` resolves from downstream crates.

/// Panics in debug builds, logs an error and continues in release. Used for
/// invariants that indicate a programmer error rather than bad data (e.g. a
/// destroyed handle reused, an unrecognized resource block routed to no
/// subsystem).
#[macro_export]
macro_rules! debug_panic {
    ($($arg:tt)*) => {
        if cfg!(debug_assertions) {
            panic!($($arg)*);
        } else {
            $crate::tracing::error!($($arg)*);
        }
    };
}

pub use tracing;
