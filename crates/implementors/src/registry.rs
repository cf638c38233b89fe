//! The registry coordinator: buffering, merge, and the consumer handshake.
//!
//! # Role
//!
//! [`ImplementorRegistry`] is the rendezvous point between fragments and the
//! presentation layer. Fragments call [`ImplementorRegistry::contribute`] in
//! whatever order they load; the one consumer calls
//! [`ImplementorRegistry::register_consumer`] whenever its own
//! initialization runs. Neither side needs to know about the other's timing.
//!
//! # State machine
//!
//! Two states. **Buffering**: no consumer yet; contributions accumulate in
//! the index. **Active**: a consumer is attached and observes the index —
//! the full accumulation once, then each merged delta in merge order. The
//! transition happens on registration and is never reversed; the registry
//! lives as long as the process.
//!
//! # Invariants
//!
//! - Every contributed entry reaches the consumer exactly once, in per-key
//!   arrival order, whatever the interleaving of contributions and
//!   registration. Enforced by the `delivered` handshake below; tested by
//!   `prop_interleaving_observes_union_once`.
//! - A contribution is never dropped: it merges into the index before any
//!   delivery decision is made, so there is no path on which it is lost.

use tracing::{debug, warn};

use crate::contribution::Contribution;
use crate::error::RegistryError;
use crate::index::{ImplementorIndex, MergeStats};

/// What happens when a consumer registers while another is attached.
///
/// The handshake supports exactly one consumer per process lifetime; this
/// policy makes the collision outcome explicit instead of undefined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsumerPolicy {
	/// Fail the new registration with
	/// [`RegistryError::ConsumerAlreadyRegistered`]; the attached consumer
	/// is undisturbed.
	#[default]
	Reject,
	/// Detach the old consumer and hand the new one the full accumulated
	/// index through the normal handshake, as if it were the first.
	Replace,
}

/// Receives merged index batches from the coordinator.
///
/// The first batch a consumer sees is the full accumulation at handoff
/// time; every later batch is one contribution's delta, already merged
/// into the registry. Return values are not modeled; presentation is the
/// consumer's business.
///
/// Blanket-implemented for closures, so
/// `register_consumer(|batch: &ImplementorIndex| ...)` works directly.
pub trait IndexConsumer {
	fn receive(&mut self, batch: &ImplementorIndex);
}

impl<F> IndexConsumer for F
where
	F: FnMut(&ImplementorIndex),
{
	fn receive(&mut self, batch: &ImplementorIndex) {
		self(batch)
	}
}

enum Link {
	/// No consumer yet; the index doubles as the pending buffer.
	Buffering,
	/// A consumer is attached. `delivered` records whether it has received
	/// its initial full-index batch.
	Active {
		consumer: Box<dyn IndexConsumer + Send>,
		delivered: bool,
	},
}

/// The fragment/consumer coordinator. See the module docs for the protocol.
pub struct ImplementorRegistry {
	policy: ConsumerPolicy,
	index: ImplementorIndex,
	link: Link,
	contributions: usize,
}

impl Default for ImplementorRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl ImplementorRegistry {
	/// Creates a buffering registry with [`ConsumerPolicy::Reject`].
	pub fn new() -> Self {
		Self::with_policy(ConsumerPolicy::default())
	}

	/// Creates a buffering registry with an explicit duplicate-consumer
	/// policy.
	pub fn with_policy(policy: ConsumerPolicy) -> Self {
		Self {
			policy,
			index: ImplementorIndex::new(),
			link: Link::Buffering,
			contributions: 0,
		}
	}

	/// Merges one fragment's contribution into the registry.
	///
	/// Total and infallible: any well-typed contribution merges, in call
	/// order, whether or not a consumer exists yet. If one does, it is
	/// forwarded the merged batch before this returns — the full index if
	/// this is its first delivery, the delta otherwise.
	pub fn contribute(&mut self, contribution: Contribution) -> MergeStats {
		if contribution.is_empty() {
			warn!("empty implementor contribution merged");
		}

		let delta = ImplementorIndex::from(contribution);
		let stats = self.index.absorb(&delta);
		self.contributions += 1;
		debug!(
			packages = delta.len(),
			entries = stats.entries_added,
			total_packages = self.index.len(),
			total_entries = self.index.entry_count(),
			"merged implementor contribution"
		);

		if let Link::Active { consumer, delivered } = &mut self.link {
			if *delivered {
				consumer.receive(&delta);
			} else {
				*delivered = true;
				consumer.receive(&self.index);
			}
		}
		stats
	}

	/// Attaches `consumer` as the single observer of the merged index.
	///
	/// If contributions are already buffered, the consumer receives the
	/// full accumulation before this returns. If nothing has arrived yet,
	/// it is invoked on the next merge, or by [`ImplementorRegistry::settle`]
	/// with an empty index if no fragment ever loads.
	///
	/// A second registration follows the configured [`ConsumerPolicy`].
	pub fn register_consumer<C>(&mut self, consumer: C) -> Result<(), RegistryError>
	where
		C: IndexConsumer + Send + 'static,
	{
		self.register_boxed(Box::new(consumer))
	}

	fn register_boxed(&mut self, mut consumer: Box<dyn IndexConsumer + Send>) -> Result<(), RegistryError> {
		if matches!(self.link, Link::Active { .. }) {
			match self.policy {
				ConsumerPolicy::Reject => {
					warn!("implementor index consumer already registered; rejecting");
					return Err(RegistryError::ConsumerAlreadyRegistered);
				}
				ConsumerPolicy::Replace => {
					debug!("replacing implementor index consumer");
				}
			}
		}

		let delivered = !self.index.is_empty();
		if delivered {
			debug!(
				packages = self.index.len(),
				entries = self.index.entry_count(),
				"handing buffered implementor index to consumer"
			);
			consumer.receive(&self.index);
		} else {
			debug!("implementor index consumer registered before any contribution");
		}
		self.link = Link::Active { consumer, delivered };
		Ok(())
	}

	/// End-of-load trigger: delivers the current index — possibly empty —
	/// to a consumer that has not yet received its initial batch.
	///
	/// Idempotent; a no-op when there is no consumer or it has already
	/// been delivered to.
	pub fn settle(&mut self) {
		if let Link::Active { consumer, delivered } = &mut self.link
			&& !*delivered
		{
			*delivered = true;
			debug!(packages = self.index.len(), "settling implementor index to consumer");
			consumer.receive(&self.index);
		}
	}

	/// The accumulated index, whichever state currently holds it.
	pub fn index(&self) -> &ImplementorIndex {
		&self.index
	}

	/// True once a consumer is attached.
	pub fn is_active(&self) -> bool {
		matches!(self.link, Link::Active { .. })
	}

	/// Number of contributions merged so far.
	pub fn contributions(&self) -> usize {
		self.contributions
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parking_lot::Mutex;
	use proptest::prelude::*;

	use super::*;
	use crate::index::Entry;

	/// Recorder consumer: keeps a clone of every batch it receives.
	#[derive(Clone, Default)]
	struct Recorder {
		batches: Arc<Mutex<Vec<ImplementorIndex>>>,
	}

	impl Recorder {
		fn consumer(&self) -> impl IndexConsumer + Send + 'static {
			let batches = Arc::clone(&self.batches);
			move |batch: &ImplementorIndex| batches.lock().push(batch.clone())
		}

		fn batches(&self) -> Vec<ImplementorIndex> {
			self.batches.lock().clone()
		}
	}

	fn contribution(groups: &[(&str, &[&str])]) -> Contribution {
		let mut c = Contribution::new();
		for (package, entries) in groups {
			c.push(package, entries.iter().copied());
		}
		c
	}

	fn rendered(index: &ImplementorIndex, package: &str) -> Vec<String> {
		index.get(package).unwrap_or(&[]).iter().map(|entry| entry.as_str().to_owned()).collect()
	}

	/// Contribute twice to one key, then register: the consumer receives
	/// the buffered accumulation once, in arrival order.
	#[test]
	fn test_buffered_handoff_on_registration() {
		let mut registry = ImplementorRegistry::new();
		registry.contribute(contribution(&[("pkgA", &["impl X for Y"])]));
		registry.contribute(contribution(&[("pkgA", &["impl Z for W"])]));
		assert!(!registry.is_active());

		let recorder = Recorder::default();
		registry.register_consumer(recorder.consumer()).expect("first consumer");
		assert!(registry.is_active());

		let batches = recorder.batches();
		assert_eq!(batches.len(), 1, "exactly one handoff");
		assert_eq!(rendered(&batches[0], "pkgA"), ["impl X for Y", "impl Z for W"]);
	}

	/// Register first, then contribute: the consumer is invoked with the
	/// new contribution reflected in the registry.
	#[test]
	fn test_contribution_after_registration_forwarded() {
		let mut registry = ImplementorRegistry::new();
		let recorder = Recorder::default();
		registry.register_consumer(recorder.consumer()).expect("first consumer");
		assert_eq!(recorder.batches().len(), 0, "nothing to deliver yet");

		registry.contribute(contribution(&[("pkgB", &["impl Q for R"])]));

		let batches = recorder.batches();
		assert_eq!(batches.len(), 1);
		assert_eq!(rendered(&batches[0], "pkgB"), ["impl Q for R"]);
		assert_eq!(rendered(registry.index(), "pkgB"), ["impl Q for R"]);
	}

	/// After the initial handoff, each contribution arrives as its own
	/// delta, in merge order.
	#[test]
	fn test_deltas_follow_initial_batch() {
		let mut registry = ImplementorRegistry::new();
		registry.contribute(contribution(&[("pkgA", &["first"])]));

		let recorder = Recorder::default();
		registry.register_consumer(recorder.consumer()).expect("first consumer");
		registry.contribute(contribution(&[("pkgA", &["second"])]));
		registry.contribute(contribution(&[("pkgC", &["third"])]));

		let batches = recorder.batches();
		assert_eq!(batches.len(), 3);
		assert_eq!(rendered(&batches[0], "pkgA"), ["first"]);
		assert_eq!(rendered(&batches[1], "pkgA"), ["second"]);
		assert_eq!(rendered(&batches[2], "pkgC"), ["third"]);
		assert_eq!(rendered(registry.index(), "pkgA"), ["first", "second"]);
	}

	/// Disjoint keys stay independent in either arrival order.
	#[test]
	fn test_disjoint_keys_either_order() {
		for flip in [false, true] {
			let a = contribution(&[("pkgA", &["impl A for B"])]);
			let c = contribution(&[("pkgC", &["impl C for D"])]);

			let mut registry = ImplementorRegistry::new();
			let (first, second) = if flip { (c.clone(), a.clone()) } else { (a.clone(), c.clone()) };
			registry.contribute(first);
			registry.contribute(second);

			let recorder = Recorder::default();
			registry.register_consumer(recorder.consumer()).expect("first consumer");

			let batches = recorder.batches();
			assert_eq!(batches.len(), 1);
			assert_eq!(rendered(&batches[0], "pkgA"), ["impl A for B"]);
			assert_eq!(rendered(&batches[0], "pkgC"), ["impl C for D"]);
		}
	}

	/// Zero contributions ever: settling delivers an empty index, not an
	/// error, and settling again is a no-op.
	#[test]
	fn test_settle_delivers_empty_index() {
		let mut registry = ImplementorRegistry::new();
		let recorder = Recorder::default();
		registry.register_consumer(recorder.consumer()).expect("first consumer");

		registry.settle();
		registry.settle();

		let batches = recorder.batches();
		assert_eq!(batches.len(), 1);
		assert!(batches[0].is_empty());
	}

	/// Settle before any consumer exists, or after delivery, is a no-op.
	#[test]
	fn test_settle_noop_when_delivered_or_unregistered() {
		let mut registry = ImplementorRegistry::new();
		registry.settle();

		registry.contribute(contribution(&[("pkgA", &["impl X for Y"])]));
		let recorder = Recorder::default();
		registry.register_consumer(recorder.consumer()).expect("first consumer");
		registry.settle();

		assert_eq!(recorder.batches().len(), 1, "handoff only, settle added nothing");
	}

	/// Default policy: a second consumer is rejected and the first keeps
	/// observing.
	#[test]
	fn test_second_consumer_rejected() {
		let mut registry = ImplementorRegistry::new();
		let first = Recorder::default();
		registry.register_consumer(first.consumer()).expect("first consumer");

		let second = Recorder::default();
		let err = registry.register_consumer(second.consumer()).expect_err("second consumer rejected");
		assert!(matches!(err, RegistryError::ConsumerAlreadyRegistered));

		registry.contribute(contribution(&[("pkgA", &["impl X for Y"])]));
		assert_eq!(first.batches().len(), 1);
		assert_eq!(second.batches().len(), 0);
	}

	/// Replace policy: the new consumer gets the full accumulation and the
	/// old one stops observing.
	#[test]
	fn test_replace_policy_hands_over() {
		let mut registry = ImplementorRegistry::with_policy(ConsumerPolicy::Replace);
		registry.contribute(contribution(&[("pkgA", &["impl X for Y"])]));

		let first = Recorder::default();
		registry.register_consumer(first.consumer()).expect("first consumer");

		registry.contribute(contribution(&[("pkgA", &["impl Z for W"])]));
		assert_eq!(first.batches().len(), 2);

		let second = Recorder::default();
		registry.register_consumer(second.consumer()).expect("replacement accepted");

		let handoff = second.batches();
		assert_eq!(handoff.len(), 1);
		assert_eq!(rendered(&handoff[0], "pkgA"), ["impl X for Y", "impl Z for W"]);

		registry.contribute(contribution(&[("pkgB", &["impl Q for R"])]));
		assert_eq!(first.batches().len(), 2, "detached consumer sees nothing further");
		assert_eq!(second.batches().len(), 2);
	}

	/// A degenerate (empty) contribution merges without disturbing state.
	#[test]
	fn test_empty_contribution_accepted() {
		let mut registry = ImplementorRegistry::new();
		let stats = registry.contribute(Contribution::new());
		assert_eq!(stats, MergeStats::default());
		assert_eq!(registry.contributions(), 1);
		assert!(registry.index().is_empty());
	}

	fn arb_contribution() -> impl Strategy<Value = Contribution> {
		proptest::collection::vec(("[a-d]", proptest::collection::vec("[a-z]{1,6}", 0..4)), 0..5).prop_map(|groups| {
			let mut c = Contribution::new();
			for (package, entries) in groups {
				c.push(&package, entries);
			}
			c
		})
	}

	proptest! {
		/// For any contributions and any registration point among them, the
		/// consumer's batches union to exactly the full merged index: every
		/// entry observed once, in per-key arrival order. Registration
		/// placement changes delivery timing only.
		#[test]
		fn prop_interleaving_observes_union_once(
			contributions in proptest::collection::vec(arb_contribution(), 0..6),
			register_at in 0usize..7,
		) {
			let register_at = register_at.min(contributions.len());

			let mut expected = ImplementorIndex::new();
			for c in contributions.iter().cloned() {
				expected.merge(c);
			}

			let mut registry = ImplementorRegistry::new();
			let recorder = Recorder::default();
			for (i, c) in contributions.into_iter().enumerate() {
				if i == register_at {
					registry.register_consumer(recorder.consumer()).expect("first consumer");
				}
				registry.contribute(c);
			}
			if register_at == registry.contributions() {
				registry.register_consumer(recorder.consumer()).expect("first consumer");
			}
			registry.settle();

			let mut observed = ImplementorIndex::new();
			for batch in recorder.batches() {
				observed.absorb(&batch);
			}

			prop_assert_eq!(&observed, &expected);
			prop_assert_eq!(registry.index(), &expected);
			for (package, entries) in expected.iter() {
				let lhs: Vec<_> = entries.iter().map(Entry::as_str).collect();
				let rhs: Vec<_> = observed.get(package).expect("same keys").iter().map(Entry::as_str).collect();
				prop_assert_eq!(lhs, rhs, "per-key arrival order preserved for {}", package);
			}
		}
	}
}
