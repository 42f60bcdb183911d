//! An unbounded ordered map built from size-capped B+tree nodes.
//!
//! [`BigOrderedMap`] stores its entries across many independently addressable nodes, each kept
//! under [`MAX_NODE_BYTES`] of encoded data. Only the leaves hold values; they are linked in key
//! order so iteration never has to climb back up the tree. Nodes live in a slot arena and refer to
//! each other by handle, while the root is kept inline in the map itself.
//!
//! # Example
//!
//! ```
//! use big_ordered_map::{BigOrderedMap, MapConfig};
//!
//! // Tiny nodes, so that even a handful of entries builds a multi-level tree.
//! let config = MapConfig { inner_max_degree: 4, leaf_max_degree: 3, ..MapConfig::default() };
//! let mut map: BigOrderedMap<u32, &str> = BigOrderedMap::with_config(config).unwrap();
//!
//! for (k, v) in [(5, "five"), (1, "one"), (9, "nine"), (3, "three"), (7, "seven")] {
//!     map.add(k, v).unwrap();
//! }
//! assert!(map.height() > 1);
//!
//! assert_eq!(map.borrow(&3), Ok(&"three"));
//! assert_eq!(map.next_key(&5), Some(&7));
//! assert_eq!(map.keys().copied().collect::<Vec<_>>(), [1, 3, 5, 7, 9]);
//!
//! assert_eq!(map.pop_front().unwrap(), (1, "one"));
//! assert_eq!(map.remove(&9), Ok("nine"));
//! assert_eq!(map.len(), 3);
//! ```
//!
//! # Sizing
//!
//! Keys and values implement [`EncodedSize`]. When both report a constant size the node degrees
//! are fixed when the map is created; otherwise they are derived from the first entry and every
//! later insert is checked against the byte ceiling before the map is touched. Degrees can also be
//! set explicitly with [`MapConfig`] or derived from [`SizeHints`].
//!
//! # Features
//!
//! - **`no_std` compatible** - only requires `alloc`.
//! - **`serde`** - `Serialize`/`Deserialize` for [`MapConfig`], [`SizeHints`] and the node records.

#![no_std]
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod config;
mod encoded_size;
mod error;
mod raw;

pub mod big_ordered_map;

pub use big_ordered_map::{BigOrderedMap, Cursor};
pub use config::{DEFAULT_TARGET_NODE_SIZE, INNER_MIN_DEGREE, LEAF_MIN_DEGREE, MAX_DEGREE, MAX_NODE_BYTES};
pub use config::{MapConfig, SizeHints};
pub use encoded_size::EncodedSize;
pub use error::{MapError, Result};
