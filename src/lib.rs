//! This is a library to compute the [modular decomposition](https://en.wikipedia.org/wiki/Modular_decomposition)
//! of a simple, undirected graph.
//!
//! A node set *M* is a *module* if every node outside *M* is adjacent either
//! to all of *M* or to none of it. The set of all nodes *V* and the
//! singletons *{u}* are trivial modules. The modules that overlap no other
//! module form a tree under inclusion, the modular decomposition tree; its
//! inner nodes are series, parallel or prime and its leaves are the nodes of
//! the graph. The tree is computed with the recursive pivot algorithm of
//! Tedder, Corneil, Habib and Paul.
//!
//! # Examples
//!
//! The smallest prime graph is the path graph on 4 nodes.
//! ```rust
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use petgraph::graph::UnGraph;
//! use md_forest::{modular_decomposition, ModuleKind};
//!
//! // a path graph with 4 nodes
//! let graph = UnGraph::<(), ()>::from_edges([(0, 1), (1, 2), (2, 3)]);
//! let md = modular_decomposition(&graph)?;
//!
//! let root = md.root().expect("non-empty graph");
//! assert_eq!(md.module_kind(root), Some(&ModuleKind::Prime));
//! # Ok(())
//! # }
//! ```
//!
//! Determining whether a graph is a [cograph](https://en.wikipedia.org/wiki/Cograph).
//! ```rust
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use petgraph::graph::UnGraph;
//! use md_forest::modular_decomposition;
//!
//! // a complete graph with 3 nodes
//! let graph = UnGraph::<(), ()>::from_edges([(0, 1), (0, 2), (1, 2)]);
//! let md = modular_decomposition(&graph)?;
//!
//! // a graph is a cograph exactly if none of its modules is prime
//! assert!(md.is_cograph());
//! # Ok(())
//! # }
//! ```
//!
//! Inputs that are not petgraph graphs can be decomposed through the plain
//! edge-list interface, which also validates them.
//! ```rust
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use md_forest::{decompose, Graph, ModuleKind};
//!
//! // two disjoint edges
//! let graph = Graph::new(4, [(0, 1), (2, 3)])?;
//! let md = decompose(&graph)?;
//!
//! let root = md.root().expect("non-empty graph");
//! assert_eq!(md.module_kind(root), Some(&ModuleKind::Parallel));
//! assert_eq!(md.children(root).count(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Generics
//!
//! [modular_decomposition] is implemented for structs that implement the
//! `petgraph` traits `NodeCompactIndexable`, `IntoNeighbors`, and
//! `GraphProp<EdgeType = Undirected>`.
//!
//! # References
//! + \[TCHP08\]: Marc Tedder, Derek Corneil, Michel Habib, and Christophe
//!   Paul. “Simpler Linear-Time Modular Decomposition via Recursive
//!   Factorizing Permutations”. <https://doi.org/10.1007/978-3-540-70575-8_52>.
//! + \[Ted11\]: Marc Tedder. “Applications of Lexicographic Breadth-First
//!   Search to Modular Decomposition, Split Decomposition, and Circle
//!   Graphs”. PhD thesis, University of Toronto.

#![forbid(unsafe_code)]
#![doc(test(attr(deny(warnings, rust_2018_idioms), allow(dead_code))))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

mod compute;
mod forest;
mod graph;
mod index;
mod md_tree;
mod set;

pub use compute::decompose;
pub use compute::modular_decomposition;
pub use compute::DecomposeError;
pub use compute::InternalInvariantError;
pub use graph::Graph;
pub use graph::InvalidGraphError;
pub use graph::VertexId;
pub use md_tree::MDTree;
pub use md_tree::ModuleIndex;
pub use md_tree::ModuleKind;
