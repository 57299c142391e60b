//! Addressing for fixed-depth binary Merkle trees.
//!
//! An [`Address`] is the path from the root of a binary tree to one of its
//! nodes: a string of up to [`MAX_DEPTH`] bits where `0` descends left and
//! `1` descends right. The empty path is the root; paths of the tree's full
//! depth are leaves and biject with non-negative leaf indices.

#![warn(missing_docs)]

mod address;

pub use address::{leaf_count, Address, MAX_DEPTH};
