//! The payload one fragment hands to the coordinator.
//!
//! # Role
//!
//! A [`Contribution`] is the fixed mapping a single fragment produces at
//! build time: package name to the ordered entries that fragment declares
//! for it. It is built once, owned by the fragment until ingestion, and
//! consumed whole by [`crate::ImplementorRegistry::contribute`].
//!
//! Degenerate shapes are accepted as-is: a duplicate key within one
//! document appends (see the `Deserialize` impl), and an empty entry
//! sequence still names its key. Merge is total over any well-typed
//! contribution.

use std::fmt;

use indexmap::map::Entry as Slot;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::index::{Entry, EntryMap};

/// One fragment's key-to-entries mapping, in generation order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Contribution {
	map: EntryMap,
}

impl Contribution {
	/// Creates an empty contribution.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `entries` under `package`, keeping any entries already
	/// pushed for that key ahead of them.
	pub fn push<I, E>(&mut self, package: &str, entries: I)
	where
		I: IntoIterator<Item = E>,
		E: Into<Entry>,
	{
		let entries = entries.into_iter().map(Into::into);
		match self.map.entry(Box::from(package)) {
			Slot::Occupied(mut slot) => slot.get_mut().extend(entries),
			Slot::Vacant(slot) => {
				slot.insert(entries.collect());
			}
		}
	}

	/// Combines `other` into `self`: per-key append, `other`'s entries
	/// after `self`'s. The same operation [`crate::ImplementorIndex::merge`]
	/// applies, usable to pre-combine contributions.
	pub fn merge(&mut self, other: Contribution) {
		for (package, entries) in other.map {
			match self.map.entry(package) {
				Slot::Occupied(mut slot) => slot.get_mut().extend(entries),
				Slot::Vacant(slot) => {
					slot.insert(entries);
				}
			}
		}
	}

	/// Iterates `(package, entries)` pairs in generation order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[Entry])> {
		self.map.iter().map(|(package, entries)| (&**package, entries.as_slice()))
	}

	/// Number of distinct packages named.
	pub fn len(&self) -> usize {
		self.map.len()
	}

	/// True if the contribution names no package at all.
	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}

	/// Total entries across all packages.
	pub fn entry_count(&self) -> usize {
		self.map.values().map(Vec::len).sum()
	}

	pub(crate) fn into_map(self) -> EntryMap {
		self.map
	}
}

impl fmt::Debug for Contribution {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(&self.map).finish()
	}
}

impl Serialize for Contribution {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut map = serializer.serialize_map(Some(self.map.len()))?;
		for (package, entries) in &self.map {
			map.serialize_entry(&**package, entries)?;
		}
		map.end()
	}
}

impl<'de> Deserialize<'de> for Contribution {
	/// Deserializes the fragment-file object shape: package name to array
	/// of rendered entry strings. Duplicate keys within one document
	/// append rather than replace, so no declared entry is lost.
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		struct ContributionVisitor;

		impl<'de> Visitor<'de> for ContributionVisitor {
			type Value = Contribution;

			fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str("a map from package name to a list of implementor entries")
			}

			fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
			where
				A: MapAccess<'de>,
			{
				let mut contribution = Contribution::new();
				while let Some((package, entries)) = access.next_entry::<String, Vec<Entry>>()? {
					contribution.push(&package, entries);
				}
				Ok(contribution)
			}
		}

		deserializer.deserialize_map(ContributionVisitor)
	}
}
