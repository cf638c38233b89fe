//! The process-wide coordinator slot.
//!
//! Fragments share no linkage beyond the process itself, so the registry
//! they all reach lives behind one static accessor, initialized lazily on
//! first touch and alive for the process's lifetime. The coordinator's
//! state machine is single-threaded by design; the mutex exists only
//! because Rust statics must be `Sync`. Each entry point locks, runs one
//! complete operation — consumer delivery included, so consumers observe
//! merges in merge order — and unlocks.
//!
//! Consumers must not call back into this module from inside a delivery;
//! the slot is held for the duration of the call.

use std::sync::LazyLock;

use parking_lot::Mutex;

use crate::contribution::Contribution;
use crate::error::RegistryError;
use crate::fragment;
use crate::index::{ImplementorIndex, MergeStats};
use crate::registry::{ImplementorRegistry, IndexConsumer};

static REGISTRY: LazyLock<Mutex<ImplementorRegistry>> = LazyLock::new(|| Mutex::new(ImplementorRegistry::new()));

/// Merges one contribution into the process-wide registry.
pub fn contribute(contribution: Contribution) -> MergeStats {
	REGISTRY.lock().contribute(contribution)
}

/// Attaches the single process-wide index consumer.
pub fn register_consumer<C>(consumer: C) -> Result<(), RegistryError>
where
	C: IndexConsumer + Send + 'static,
{
	REGISTRY.lock().register_consumer(consumer)
}

/// Fires the end-of-load trigger on the process-wide registry.
pub fn settle() {
	REGISTRY.lock().settle()
}

/// Drains every `inventory`-collected fragment into the process-wide
/// registry.
pub fn install_collected() -> MergeStats {
	fragment::install_collected(&mut REGISTRY.lock())
}

/// Runs `f` against the current accumulated index.
pub fn with_index<R>(f: impl FnOnce(&ImplementorIndex) -> R) -> R {
	f(REGISTRY.lock().index())
}
