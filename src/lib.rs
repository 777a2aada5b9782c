//! A classic B-Tree map with a configurable branching factor.
//!
//! This crate provides [`VBTreeMap`], an ordered map with the same contract as
//! the standard library's `BTreeMap` plus one extra knob: the branching factor
//! `b` is chosen at construction time rather than baked in at compile time.
//!
//! - [`new`](VBTreeMap::new) - A map with the default factor (`b = 16`)
//! - [`with_branching`](VBTreeMap::with_branching) - A map with a caller-chosen
//!   factor, down to `b = 2` for exhaustive small-node testing
//!
//! # Example
//!
//! ```
//! use vb_tree::VBTreeMap;
//!
//! let mut scores = VBTreeMap::new();
//! scores.insert("Alice", 100);
//! scores.insert("Bob", 85);
//! scores.insert("Carol", 92);
//!
//! assert_eq!(scores.get(&"Bob"), Some(&85));
//! assert_eq!(scores.len(), 3);
//!
//! // Iteration is always in key order, regardless of insertion order.
//! let names: Vec<_> = scores.keys().copied().collect();
//! assert_eq!(names, ["Alice", "Bob", "Carol"]);
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`, no standard library dependency
//! - **Familiar API** - Mirrors `std::collections::BTreeMap` where the two overlap
//! - **Tunable branching factor** - Every node holds `b-1` to `2b-1` entries;
//!   pick `b` per map instead of per build
//! - **Single-pass mutation** - Insertions split full nodes and deletions top up
//!   minimal nodes *on the way down*, so neither ever walks back up the tree
//!
//! # Implementation
//!
//! The map is a classic B-tree in the Knuth/CLRS sense: every node, internal
//! nodes included, stores key-value entries, and an internal node with `n` keys
//! owns exactly `n + 1` children. Splits move the median entry up; deletions
//! rotate or merge entries across siblings before descending so that underflow
//! can never propagate upward. Nodes live in an arena and refer to each other
//! through compact handles.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
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

mod raw;

pub mod vbtree_map;

pub use vbtree_map::VBTreeMap;
