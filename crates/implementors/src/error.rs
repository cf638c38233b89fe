use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the coordinator and the fragment loader.
///
/// Merging itself is total: any well-typed [`crate::Contribution`] merges,
/// so the only failure sources are the consumer handshake and the
/// fragment-file boundary. A failed operation never corrupts the index;
/// later fragments keep merging normally.
#[derive(Debug, Error)]
pub enum RegistryError {
	/// A consumer is already attached and the active policy rejects
	/// replacement. The attached consumer is undisturbed.
	#[error("a consumer is already registered for the implementor index")]
	ConsumerAlreadyRegistered,

	/// A fragment file did not contain the expected package-to-entries
	/// mapping.
	#[error("invalid fragment contribution in {}: {source}", path.display())]
	InvalidContribution {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	/// A fragment file could not be read.
	#[error("failed to read fragment {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}
