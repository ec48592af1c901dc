//! Graph module for lock order checking
//!
//! The follow graph records which mutexes were acquired while which others
//! were held, across all threads.

pub(crate) mod follow_graph;

pub use follow_graph::FollowGraph;
