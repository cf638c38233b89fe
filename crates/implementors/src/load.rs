//! Fragment file loading.
//!
//! On-disk fragments are one JSON file per documented trait, each holding
//! the package-to-entries object a [`crate::Contribution`] deserializes
//! from. Loading a directory never stops at a bad file: per-file errors are
//! reported and the remaining fragments keep loading, so one malformed
//! fragment cannot keep the rest of the index from assembling.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::error;

use crate::contribution::Contribution;
use crate::error::RegistryError;

/// Aggregate result of loading a fragment directory tree.
#[derive(Debug, Default)]
pub struct FragmentDirReport {
	/// Successfully parsed fragments, in sorted path order, ready for
	/// [`crate::ImplementorRegistry::contribute`].
	pub fragments: Vec<(PathBuf, Contribution)>,
	/// Read or parse failures keyed by source file path.
	pub errors: Vec<(PathBuf, RegistryError)>,
}

impl FragmentDirReport {
	/// True if every fragment file loaded.
	pub fn is_clean(&self) -> bool {
		self.errors.is_empty()
	}
}

/// Reads and parses one fragment file.
pub fn load_fragment(path: &Path) -> Result<Contribution, RegistryError> {
	let raw = fs::read_to_string(path).map_err(|source| RegistryError::Io {
		path: path.to_path_buf(),
		source,
	})?;
	serde_json::from_str(&raw).map_err(|source| RegistryError::InvalidContribution {
		path: path.to_path_buf(),
		source,
	})
}

/// Loads every `*.json` fragment under `dir`, recursively, in sorted path
/// order.
///
/// Failures are accumulated in the report and logged; loading continues
/// past them. A missing or unreadable directory is itself one report error.
pub fn load_fragment_dir(dir: &Path) -> FragmentDirReport {
	let mut report = FragmentDirReport::default();
	let mut paths = Vec::new();
	collect_fragment_paths(dir, &mut paths, &mut report);
	paths.sort();

	for path in paths {
		match load_fragment(&path) {
			Ok(contribution) => report.fragments.push((path, contribution)),
			Err(err) => {
				error!(path = %path.display(), error = %err, "failed to load implementor fragment");
				report.errors.push((path, err));
			}
		}
	}
	report
}

fn collect_fragment_paths(dir: &Path, paths: &mut Vec<PathBuf>, report: &mut FragmentDirReport) {
	let entries = match fs::read_dir(dir) {
		Ok(entries) => entries,
		Err(source) => {
			error!(path = %dir.display(), error = %source, "failed to read fragment directory");
			report.errors.push((
				dir.to_path_buf(),
				RegistryError::Io {
					path: dir.to_path_buf(),
					source,
				},
			));
			return;
		}
	};

	for entry in entries {
		let path = match entry {
			Ok(entry) => entry.path(),
			Err(source) => {
				report.errors.push((
					dir.to_path_buf(),
					RegistryError::Io {
						path: dir.to_path_buf(),
						source,
					},
				));
				continue;
			}
		};
		if path.is_dir() {
			collect_fragment_paths(&path, paths, report);
		} else if path.extension().is_some_and(|ext| ext == "json") {
			paths.push(path);
		}
	}
}
