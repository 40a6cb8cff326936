//! Host environment (component K, §4.11) — ambient stack addition.
//!
//! The teacher crate has no equivalent (it has no host-injected
//! singletons), so this is grounded instead on the general Rust idiom for
//! "installed once, read many times" process state — a `OnceLock`, the
//! same shape `log`/`tracing` use to install a global subscriber exactly
//! once. `Environment` is modeled as an explicit value per §9's design
//! note ("model this as an explicit environment value") rather than two
//! bare globals, with the `OnceLock` installer kept only for parity with
//! the abstract C entry point `compress_chunk_init`.

use std::sync::OnceLock;

/// A 48-bit host clock reading (§4.7's `start_timestamp`/`end_timestamp`).
pub type Timestamp48 = u64;

/// The two pieces of process-wide state every compress call needs: a
/// clock and a build identifier. Both are read-only once installed.
#[derive(Clone, Copy)]
pub struct Environment {
  pub get_timestamp: fn() -> Timestamp48,
  pub version_id: u32,
}

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// One-shot process init (`compress_chunk_init` in §6's abstract API).
/// Installing twice is a programming error in the same sense a second
/// `tracing::subscriber::set_global_default` call is: it returns an error
/// instead of silently replacing the first environment, since flight
/// software would rather fail loudly at startup than race two timestamp
/// providers at runtime.
pub fn compress_chunk_init(get_timestamp: fn() -> Timestamp48, version_id: u32) -> Result<(), Environment> {
  ENVIRONMENT.set(Environment {
    get_timestamp,
    version_id,
  })
}

/// Borrows the installed environment. Callers see `PAR_NULL` rather than a
/// panic when this is invoked before `compress_chunk_init`, so a flight
/// binary can report and recover instead of aborting.
pub fn environment() -> crate::errors::CmpResult<&'static Environment> {
  ENVIRONMENT
    .get()
    .ok_or(crate::errors::CmpError::ParNull)
}
