// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Translation of TSC merkle proofs into [`MerklePath`]s.
//!
//! A TSC proof gives a leaf index and one sibling hash per tree level, bottom-up. A merkle path
//! instead holds explicit nodes per level, with offsets. At level 0 the path carries both the
//! leaf and its sibling, above that only the sibling of the node being climbed through, whose
//! offset is `(leaf_index >> level) ^ 1`.

use bitcoin::{TxMerkleNode, Txid};

use serde::{Deserialize, Serialize};

use crate::envelope::merkle_path::{
	txid_to_node, MerklePath, MerkleProofError, PathElement, PathLevel, MAX_TREE_HEIGHT,
};

use core::str::FromStr;

/// Node value TSC proofs use for a node paired with itself.
pub const DUPLICATE_MARKER: &str = "*";

/// A merkle proof in the TSC format served by block explorers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TscProof {
	/// Index of the transaction in its block.
	pub index: u64,
	/// The transaction id, or the full transaction in hex.
	pub tx_or_id: String,
	/// The block hash (or header, or merkle root) the proof leads to.
	#[serde(default)]
	pub target: String,
	/// Sibling hashes from the leaf level up, in display byte order, or [`DUPLICATE_MARKER`].
	pub nodes: Vec<String>,
}

/// The sibling of a node in a TSC proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SiblingHash {
	/// A sibling with a distinct hash.
	Hash(TxMerkleNode),
	/// No distinct sibling: the node is the last of an odd-sized level and is paired with
	/// itself.
	Duplicate,
}

impl SiblingHash {
	/// Parses the node given for `level` of a TSC proof.
	pub fn parse(level: usize, node: &str) -> Result<Self, MerkleProofError> {
		if node == DUPLICATE_MARKER {
			return Ok(SiblingHash::Duplicate);
		}
		if node.len() != 64 {
			return Err(MerkleProofError::InvalidNodeHash { level, value: node.to_owned() });
		}
		TxMerkleNode::from_str(node)
			.map(SiblingHash::Hash)
			.map_err(|_| MerkleProofError::InvalidNodeHash { level, value: node.to_owned() })
	}

	fn to_element(&self, offset: u64) -> PathElement {
		match self {
			SiblingHash::Hash(hash) => PathElement::with_hash(offset, *hash),
			SiblingHash::Duplicate => PathElement::duplicate(offset),
		}
	}
}

/// Rebuilds the levels of a merkle path from a leaf index and its bottom-up sibling hashes.
///
/// The result has one level per sibling. Level 0 holds the leaf, flagged as the transaction and
/// without a hash, and its sibling at `leaf_index ^ 1`, ordered by offset. Each level `i > 0`
/// holds only the sibling at `(leaf_index >> i) ^ 1`.
///
/// Without siblings the transaction is alone in its block and the single level holds only the
/// leaf, which must then be at index 0. A leaf index which does not fit a tree of the given
/// height is rejected.
pub fn translate(
	leaf_index: u64, siblings: &[SiblingHash],
) -> Result<Vec<PathLevel>, MerkleProofError> {
	let height = siblings.len();
	if height > MAX_TREE_HEIGHT {
		return Err(MerkleProofError::TooManyLevels { height });
	}
	if height < MAX_TREE_HEIGHT && leaf_index >> height != 0 {
		return Err(MerkleProofError::IndexOutOfRange { leaf_index, height });
	}

	let leaf = PathElement::leaf(leaf_index, None);
	let first = match siblings.first() {
		Some(first) => first,
		None => return Ok(vec![vec![leaf]]),
	};

	let mut levels = Vec::with_capacity(height);
	let mut level_zero = vec![leaf, first.to_element(leaf_index ^ 1)];
	level_zero.sort_by_key(|node| node.offset);
	levels.push(level_zero);

	for (level, sibling) in siblings.iter().enumerate().skip(1) {
		let offset = (leaf_index >> level) ^ 1;
		levels.push(vec![sibling.to_element(offset)]);
	}
	Ok(levels)
}

impl TscProof {
	/// Parses the sibling hashes of the proof.
	pub fn sibling_hashes(&self) -> Result<Vec<SiblingHash>, MerkleProofError> {
		self.nodes.iter().enumerate().map(|(level, node)| SiblingHash::parse(level, node)).collect()
	}

	/// Converts the proof into a merkle path for `txid` in the block at `block_height`.
	///
	/// If the proof names its transaction by id, it must be `txid`.
	pub fn to_merkle_path(
		&self, txid: &Txid, block_height: u32,
	) -> Result<MerklePath, MerkleProofError> {
		if self.tx_or_id.len() == 64 {
			match Txid::from_str(&self.tx_or_id) {
				Ok(proven) if proven == *txid => {},
				_ => {
					return Err(MerkleProofError::TxidMismatch {
						expected: *txid,
						found: self.tx_or_id.clone(),
					})
				},
			}
		}

		let mut levels = translate(self.index, &self.sibling_hashes()?)?;
		if let Some(leaves) = levels.first_mut() {
			for node in leaves.iter_mut().filter(|node| node.txid) {
				node.hash = Some(txid_to_node(*txid));
			}
		}
		MerklePath::new(block_height, levels)
	}
}
