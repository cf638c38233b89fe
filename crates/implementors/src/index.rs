//! The merged implementor index and its per-key append merge.
//!
//! # Role
//!
//! [`ImplementorIndex`] is the accumulated registry: package name mapped to
//! the ordered entries contributed for it so far. It has no content of its
//! own — it is exactly the superposition of the contributions merged into
//! it, per-key concatenated in arrival order.
//!
//! # Invariants
//!
//! - Per-key entry order is arrival order across contributions and
//!   generation order within one contribution. Enforced by [`ImplementorIndex::merge`]
//!   and [`ImplementorIndex::absorb`] (append-only, no reordering); tested by
//!   `test_merge_appends_per_key` and `prop_merge_associative`. Failure
//!   symptom: implementor rows render in the wrong order.
//! - Merging never drops or duplicates an entry, whatever the contribution
//!   looks like (duplicate keys, empty sequences). Tested by
//!   `prop_entry_conservation`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry as Slot;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::contribution::Contribution;

/// Ordered package-to-entries storage shared by the index and contributions.
pub(crate) type EntryMap = IndexMap<Box<str>, Vec<Entry>, FxBuildHasher>;

/// One rendered implementing relationship, e.g. `impl Display for Token`.
///
/// Entries are opaque here: the listing generator renders them, the
/// presentation layer consumes them verbatim. Immutable once built and cheap
/// to clone.
#[derive(Clone, PartialEq, Eq)]
pub struct Entry(Arc<str>);

impl Entry {
	/// Wraps one pre-rendered entry.
	pub fn new(rendered: impl Into<Arc<str>>) -> Self {
		Self(rendered.into())
	}

	/// The rendered text.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for Entry {
	fn from(rendered: &str) -> Self {
		Self::new(rendered)
	}
}

impl From<String> for Entry {
	fn from(rendered: String) -> Self {
		Self::new(rendered)
	}
}

impl AsRef<str> for Entry {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Entry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl fmt::Debug for Entry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:?}", &*self.0)
	}
}

impl Serialize for Entry {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.0)
	}
}

impl<'de> Deserialize<'de> for Entry {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		String::deserialize(deserializer).map(Entry::from)
	}
}

/// Footprint of one merge: what the delta added to the index.
///
/// Purely informative; feeds diagnostics and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
	/// Packages the index had not seen before this merge.
	pub packages_added: usize,
	/// Entries appended by this merge, across all packages.
	pub entries_added: usize,
}

impl std::ops::AddAssign for MergeStats {
	fn add_assign(&mut self, rhs: Self) {
		self.packages_added += rhs.packages_added;
		self.entries_added += rhs.entries_added;
	}
}

/// The accumulated registry: package name to ordered implementor entries.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ImplementorIndex {
	map: EntryMap,
}

impl ImplementorIndex {
	/// Creates an empty index.
	pub fn new() -> Self {
		Self::default()
	}

	/// Merges one contribution: per-key append, creating absent keys.
	///
	/// Total for any well-typed contribution — duplicate keys within the
	/// contribution have already appended during its construction, and empty
	/// entry sequences still materialize their key.
	pub fn merge(&mut self, contribution: Contribution) -> MergeStats {
		let mut stats = MergeStats::default();
		for (package, entries) in contribution.into_map() {
			stats.entries_added += entries.len();
			match self.map.entry(package) {
				Slot::Occupied(mut slot) => slot.get_mut().extend(entries),
				Slot::Vacant(slot) => {
					stats.packages_added += 1;
					slot.insert(entries);
				}
			}
		}
		stats
	}

	/// Appends every entry of `other`, per key, preserving `other`'s order.
	///
	/// Same merge as [`ImplementorIndex::merge`] but borrowing the delta, so
	/// the caller can keep it for forwarding.
	pub fn absorb(&mut self, other: &ImplementorIndex) -> MergeStats {
		let mut stats = MergeStats::default();
		for (package, entries) in &other.map {
			stats.entries_added += entries.len();
			match self.map.entry(package.clone()) {
				Slot::Occupied(mut slot) => slot.get_mut().extend(entries.iter().cloned()),
				Slot::Vacant(slot) => {
					stats.packages_added += 1;
					slot.insert(entries.clone());
				}
			}
		}
		stats
	}

	/// Entries recorded for `package`, in arrival order.
	pub fn get(&self, package: &str) -> Option<&[Entry]> {
		self.map.get(package).map(Vec::as_slice)
	}

	/// Package names in first-seen order.
	pub fn packages(&self) -> impl Iterator<Item = &str> {
		self.map.keys().map(|package| &**package)
	}

	/// Iterates `(package, entries)` pairs in first-seen order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[Entry])> {
		self.map.iter().map(|(package, entries)| (&**package, entries.as_slice()))
	}

	/// Number of distinct packages.
	pub fn len(&self) -> usize {
		self.map.len()
	}

	/// True if no package has been recorded.
	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}

	/// Total entries across all packages.
	pub fn entry_count(&self) -> usize {
		self.map.values().map(Vec::len).sum()
	}
}

impl From<Contribution> for ImplementorIndex {
	fn from(contribution: Contribution) -> Self {
		Self {
			map: contribution.into_map(),
		}
	}
}

impl fmt::Debug for ImplementorIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(&self.map).finish()
	}
}
