//! Static fragment registration via `inventory`.
//!
//! A fragment compiled into the binary is the link-time rendering of a
//! self-executing index unit: each [`fragment!`] invocation creates a
//! [`FragmentDef`] and submits it through `inventory::submit!`. The host
//! drains every submitted fragment into the coordinator with
//! [`install_collected`] (or [`crate::global::install_collected`]) once, at
//! startup.

// Referenced only from `fragment!` expansions.
use paste as _;
use tracing::debug;

use crate::contribution::Contribution;
use crate::index::MergeStats;
use crate::registry::ImplementorRegistry;

/// Static fragment definition collected via `inventory`.
///
/// One per documented trait; the tables live in static storage and are
/// turned into an owned [`Contribution`] at install time.
pub struct FragmentDef {
	/// The documented item this fragment indexes implementors of.
	pub trait_path: &'static str,
	/// Crate that declared this fragment.
	pub crate_name: &'static str,
	/// Package name to the rendered entries declared for it, in
	/// generation order.
	pub groups: &'static [(&'static str, &'static [&'static str])],
}

impl FragmentDef {
	/// Builds the owned contribution this fragment hands to the
	/// coordinator.
	pub fn contribution(&self) -> Contribution {
		let mut contribution = Contribution::new();
		for (package, entries) in self.groups {
			contribution.push(package, entries.iter().copied());
		}
		contribution
	}
}

/// Wrapper for `inventory::collect!`.
pub struct FragmentReg(pub &'static FragmentDef);

inventory::collect!(FragmentReg);

/// Declares a static implementor fragment and submits it for collection.
///
/// ```ignore
/// fragment!(as_raw_fd, "std::os::fd::AsRawFd", {
///     "nix" => ["impl AsRawFd for PtyMaster", "impl AsRawFd for SignalFd"],
///     "mio" => ["impl AsRawFd for Poll"],
/// });
/// ```
#[macro_export]
macro_rules! fragment {
	($name:ident, $trait_path:expr, {
		$($package:expr => [$($entry:expr),* $(,)?]),* $(,)?
	}) => {
		paste::paste! {
			#[allow(non_upper_case_globals)]
			pub static [<FRAGMENT_ $name>]: $crate::FragmentDef = $crate::FragmentDef {
				trait_path: $trait_path,
				crate_name: env!("CARGO_PKG_NAME"),
				groups: &[$(($package, &[$($entry),*])),*],
			};

			inventory::submit! { $crate::FragmentReg(&[<FRAGMENT_ $name>]) }
		}
	};
}

/// Drains every collected fragment into `registry`.
///
/// Fragments are contributed in `trait_path` order (then declaring crate)
/// so the merged index is deterministic across link orders.
pub fn install_collected(registry: &mut ImplementorRegistry) -> MergeStats {
	let mut fragments: Vec<&'static FragmentDef> = inventory::iter::<FragmentReg>.into_iter().map(|reg| reg.0).collect();
	fragments.sort_by(|a, b| a.trait_path.cmp(b.trait_path).then_with(|| a.crate_name.cmp(b.crate_name)));

	let mut total = MergeStats::default();
	for fragment in fragments {
		debug!(trait_path = fragment.trait_path, crate_name = fragment.crate_name, "installing static implementor fragment");
		total += registry.contribute(fragment.contribution());
	}
	total
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::index::Entry;

	/// A def's groups table converts to a contribution in declared order.
	#[test]
	fn test_def_contribution_preserves_order() {
		static DEF: FragmentDef = FragmentDef {
			trait_path: "core::fmt::Display",
			crate_name: "folio-implementors",
			groups: &[("pkgB", &["impl Display for Token", "impl Display for Span"]), ("pkgA", &["impl Display for Ast"])],
		};

		let contribution = DEF.contribution();
		let pairs: Vec<_> = contribution
			.iter()
			.map(|(package, entries)| (package, entries.iter().map(Entry::as_str).collect::<Vec<_>>()))
			.collect();
		assert_eq!(
			pairs,
			[
				("pkgB", vec!["impl Display for Token", "impl Display for Span"]),
				("pkgA", vec!["impl Display for Ast"]),
			]
		);
	}

	/// A def with an empty groups table yields an empty contribution.
	#[test]
	fn test_empty_def() {
		static DEF: FragmentDef = FragmentDef {
			trait_path: "core::marker::Send",
			crate_name: "folio-implementors",
			groups: &[],
		};

		assert!(DEF.contribution().is_empty());
	}

	crate::fragment!(debug, "core::fmt::Debug", {
		"lexer" => ["impl Debug for Token"],
	});

	/// The declaration macro submits a collectable def that
	/// `install_collected` drains into a registry.
	#[test]
	fn test_macro_submits_for_collection() {
		let mut registry = ImplementorRegistry::new();
		let stats = install_collected(&mut registry);

		assert_eq!(stats.entries_added, 1);
		assert_eq!(registry.contributions(), 1);
		let entries = registry.index().get("lexer").expect("lexer present");
		assert_eq!(entries[0].as_str(), "impl Debug for Token");
	}
}
