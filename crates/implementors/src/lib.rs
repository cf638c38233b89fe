//! Trait-implementor index assembly for generated documentation.
//!
//! Documentation builds emit one index fragment per documented trait: the
//! set of types implementing it, grouped by originating package, as
//! pre-rendered entry strings. Fragments load in no particular order, and
//! the presentation layer that renders the unified index initializes on its
//! own schedule. This crate is the rendezvous between the two: fragments
//! contribute whenever they execute, the consumer registers whenever it is
//! ready, and the coordinator guarantees every entry reaches the consumer
//! exactly once, in order, regardless of interleaving.
//!
//! # Pieces
//!
//! - [`Contribution`] — one fragment's package-to-entries mapping.
//! - [`ImplementorIndex`] — the merged, queryable accumulation.
//! - [`ImplementorRegistry`] — the coordinator: buffers contributions until
//!   a consumer appears, then forwards each merged delta.
//! - [`fragment!`] / [`install_collected`] — link-time fragment
//!   registration via `inventory`.
//! - [`load_fragment_dir`] — on-disk fragment files (one JSON document per
//!   trait).
//! - [`global`] — the process-wide slot independently-loaded fragments
//!   share.
//!
//! # Example
//!
//! ```
//! use folio_implementors::{Contribution, ImplementorRegistry};
//!
//! let mut registry = ImplementorRegistry::new();
//!
//! // Fragments load first; contributions buffer.
//! let mut fragment = Contribution::new();
//! fragment.push("pkgA", ["impl Display for Token"]);
//! registry.contribute(fragment);
//!
//! // The consumer registers late and still sees everything.
//! registry.register_consumer(|index: &folio_implementors::ImplementorIndex| {
//!     assert_eq!(index.get("pkgA").map(<[_]>::len), Some(1));
//! })?;
//! # Ok::<(), folio_implementors::RegistryError>(())
//! ```

mod contribution;
mod error;
mod fragment;
pub mod global;
mod index;
mod load;
mod registry;

pub use contribution::Contribution;
pub use error::RegistryError;
pub use fragment::{FragmentDef, FragmentReg, install_collected};
pub use index::{Entry, ImplementorIndex, MergeStats};
pub use load::{FragmentDirReport, load_fragment, load_fragment_dir};
pub use registry::{ConsumerPolicy, ImplementorRegistry, IndexConsumer};
