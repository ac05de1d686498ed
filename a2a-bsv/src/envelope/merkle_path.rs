// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Merkle inclusion paths in the BRC-74 "BUMP" layout.
//!
//! A [`MerklePath`] stores, per tree level, the nodes needed to climb from one or more
//! transaction leaves to the block's merkle root. Level 0 holds the leaves themselves.

use bitcoin::consensus::encode::{self, Decodable, Encodable, VarInt};
use bitcoin::hashes::{Hash, HashEngine};
use bitcoin::io::{Read, Write};
use bitcoin::{TxMerkleNode, Txid};

use core::fmt;

/// BUMP flag bit marking a node which is a copy of its sibling and carries no hash.
const FLAG_DUPLICATE: u8 = 1;
/// BUMP flag bit marking a level 0 node as a transaction id of interest.
const FLAG_TXID: u8 = 2;

/// Deepest tree a path can describe, bounded by the 64-bit leaf offset.
pub const MAX_TREE_HEIGHT: usize = 64;

/// An error building or evaluating a merkle path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MerkleProofError {
	/// The path has no levels.
	EmptyPath,
	/// The path has more levels than a 64-bit leaf offset can address.
	TooManyLevels {
		/// The number of levels.
		height: usize,
	},
	/// The leaf index does not fit in a tree of the given height.
	IndexOutOfRange {
		/// The leaf index.
		leaf_index: u64,
		/// The tree height.
		height: usize,
	},
	/// A sibling hash was neither 64 hex characters nor the duplicate marker.
	InvalidNodeHash {
		/// The level the hash was given for.
		level: usize,
		/// The rejected value.
		value: String,
	},
	/// A node neither carries a hash nor is marked as a duplicate.
	MissingHash {
		/// The node's level.
		level: usize,
		/// The node's offset.
		offset: u64,
	},
	/// A node above level 0 is flagged as a transaction leaf.
	MisplacedLeaf {
		/// The node's level.
		level: usize,
	},
	/// A transaction leaf is also flagged as a duplicate, which BUMP cannot express.
	DuplicateLeaf {
		/// The leaf's offset.
		offset: u64,
	},
	/// No level 0 node carries the requested transaction id.
	MissingLeaf {
		/// The transaction id looked for.
		txid: Txid,
	},
	/// The node needed to climb a level is not part of the path.
	MissingSibling {
		/// The level the node is missing from.
		level: usize,
		/// The offset of the missing node.
		offset: u64,
	},
	/// A proof names a different transaction than the one it was requested for.
	TxidMismatch {
		/// The transaction the proof was requested for.
		expected: Txid,
		/// The transaction the proof names.
		found: String,
	},
}

impl fmt::Display for MerkleProofError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::EmptyPath => write!(f, "merkle path has no levels"),
			Self::TooManyLevels { height } => write!(
				f,
				"merkle path has {} levels, at most {} are supported",
				height, MAX_TREE_HEIGHT
			),
			Self::IndexOutOfRange { leaf_index, height } => {
				write!(f, "leaf index {} does not fit in a tree of height {}", leaf_index, height)
			},
			Self::InvalidNodeHash { level, value } => write!(
				f,
				"node at level {} must be a 64 character hex hash or \"*\", got {:?}",
				level, value
			),
			Self::MissingHash { level, offset } => write!(
				f,
				"node {} at level {} has neither a hash nor the duplicate flag",
				offset, level
			),
			Self::MisplacedLeaf { level } => {
				write!(f, "transaction leaf flagged at level {}, only level 0 holds leaves", level)
			},
			Self::DuplicateLeaf { offset } => {
				write!(f, "transaction leaf {} is flagged as a duplicate", offset)
			},
			Self::MissingLeaf { txid } => {
				write!(f, "transaction {} is not a leaf of the path", txid)
			},
			Self::MissingSibling { level, offset } => {
				write!(f, "node {} at level {} is missing from the path", offset, level)
			},
			Self::TxidMismatch { expected, found } => {
				write!(f, "proof is for {} but {} was requested", found, expected)
			},
		}
	}
}

impl std::error::Error for MerkleProofError {}

/// A node of a [`MerklePath`] level.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathElement {
	/// Position of the node within its level.
	pub offset: u64,
	/// The node hash, `None` for duplicates (and for the leaf in a freshly translated proof,
	/// whose hash is the transaction id).
	pub hash: Option<TxMerkleNode>,
	/// Whether this level 0 node is a transaction the path proves.
	pub txid: bool,
	/// Whether this node duplicates its sibling, which happens for the last node of a level with
	/// an odd number of nodes.
	pub duplicate: bool,
}

impl PathElement {
	/// A node with a known hash.
	pub fn with_hash(offset: u64, hash: TxMerkleNode) -> Self {
		PathElement { offset, hash: Some(hash), txid: false, duplicate: false }
	}

	/// A node duplicating its sibling.
	pub fn duplicate(offset: u64) -> Self {
		PathElement { offset, hash: None, txid: false, duplicate: true }
	}

	/// A transaction leaf.
	pub fn leaf(offset: u64, txid: Option<Txid>) -> Self {
		PathElement { offset, hash: txid.map(txid_to_node), txid: true, duplicate: false }
	}

	fn flags(&self) -> u8 {
		if self.duplicate {
			FLAG_DUPLICATE
		} else if self.txid {
			FLAG_TXID
		} else {
			0
		}
	}
}

/// Views a transaction id as a leaf node hash. Both are the double-SHA256 of their preimage in
/// the same byte order.
pub fn txid_to_node(txid: Txid) -> TxMerkleNode {
	TxMerkleNode::from_byte_array(txid.to_byte_array())
}

/// One level of a [`MerklePath`].
pub type PathLevel = Vec<PathElement>;

/// A merkle inclusion path for one or more transactions of a block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MerklePath {
	/// Height of the block whose merkle root the path leads to.
	pub block_height: u32,
	/// The levels of the path, leaves first.
	pub path: Vec<PathLevel>,
}

impl MerklePath {
	/// Builds a path, checking every node carries a hash or the duplicate flag and that only
	/// level 0 holds transaction leaves.
	pub fn new(block_height: u32, path: Vec<PathLevel>) -> Result<Self, MerkleProofError> {
		let merkle_path = MerklePath { block_height, path };
		merkle_path.validate()?;
		Ok(merkle_path)
	}

	/// Checks the invariants [`MerklePath::new`] enforces, for paths assembled from the public
	/// fields directly.
	pub fn validate(&self) -> Result<(), MerkleProofError> {
		if self.path.is_empty() {
			return Err(MerkleProofError::EmptyPath);
		}
		if self.path.len() > MAX_TREE_HEIGHT {
			return Err(MerkleProofError::TooManyLevels { height: self.path.len() });
		}
		for (level, nodes) in self.path.iter().enumerate() {
			for node in nodes {
				if node.hash.is_none() && !node.duplicate {
					return Err(MerkleProofError::MissingHash { level, offset: node.offset });
				}
				if node.txid && level > 0 {
					return Err(MerkleProofError::MisplacedLeaf { level });
				}
				if node.txid && node.duplicate {
					return Err(MerkleProofError::DuplicateLeaf { offset: node.offset });
				}
			}
		}
		Ok(())
	}

	/// Returns whether `txid` is one of the level 0 nodes.
	pub fn contains_txid(&self, txid: &Txid) -> bool {
		let leaf_hash = txid_to_node(*txid);
		self.path.first().map_or(false, |level| level.iter().any(|n| n.hash == Some(leaf_hash)))
	}

	/// Computes the merkle root the path commits `txid` to.
	///
	/// Nodes a compound path leaves out because they follow from the level below are computed
	/// from their children.
	pub fn compute_root(&self, txid: &Txid) -> Result<TxMerkleNode, MerkleProofError> {
		let leaf_hash = txid_to_node(*txid);
		let leaves = self.path.first().ok_or(MerkleProofError::EmptyPath)?;
		let leaf = leaves
			.iter()
			.find(|n| n.hash == Some(leaf_hash))
			.ok_or(MerkleProofError::MissingLeaf { txid: *txid })?;

		// A block with a single transaction has the txid as its root.
		if self.path.len() == 1 && leaves.len() == 1 {
			return Ok(leaf_hash);
		}

		let mut working = leaf_hash;
		for level in 0..self.path.len() {
			let offset = (leaf.offset >> level) ^ 1;
			working = match self.find_or_compute(level, offset)? {
				Some(NodeHash::Duplicate) => hash_pair(&working, &working),
				Some(NodeHash::Known(hash)) if offset & 1 == 1 => hash_pair(&working, &hash),
				Some(NodeHash::Known(hash)) => hash_pair(&hash, &working),
				None => return Err(MerkleProofError::MissingSibling { level, offset }),
			};
		}
		Ok(working)
	}

	/// Looks up the node at `offset` on `level`, computing it from the two nodes below when the
	/// path omits it. Returns `None` if neither is possible.
	fn find_or_compute(
		&self, level: usize, offset: u64,
	) -> Result<Option<NodeHash>, MerkleProofError> {
		let nodes = match self.path.get(level) {
			Some(nodes) => nodes,
			None => return Ok(None),
		};
		if let Some(node) = nodes.iter().find(|n| n.offset == offset) {
			if node.duplicate {
				return Ok(Some(NodeHash::Duplicate));
			}
			let hash = node.hash.ok_or(MerkleProofError::MissingHash { level, offset })?;
			return Ok(Some(NodeHash::Known(hash)));
		}
		if level == 0 {
			return Ok(None);
		}

		let left = match self.find_or_compute(level - 1, offset << 1)? {
			Some(NodeHash::Known(hash)) => hash,
			_ => return Ok(None),
		};
		let right = match self.find_or_compute(level - 1, (offset << 1) | 1)? {
			Some(NodeHash::Known(hash)) => hash,
			Some(NodeHash::Duplicate) => left,
			None => return Ok(None),
		};
		Ok(Some(NodeHash::Known(hash_pair(&left, &right))))
	}
}

enum NodeHash {
	Known(TxMerkleNode),
	Duplicate,
}

fn hash_pair(left: &TxMerkleNode, right: &TxMerkleNode) -> TxMerkleNode {
	let mut engine = TxMerkleNode::engine();
	engine.input(left.as_byte_array());
	engine.input(right.as_byte_array());
	TxMerkleNode::from_engine(engine)
}

impl Encodable for MerklePath {
	fn consensus_encode<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, bitcoin::io::Error> {
		self.validate().map_err(|e| {
			bitcoin::io::Error::new(bitcoin::io::ErrorKind::InvalidData, e.to_string())
		})?;
		let mut len = VarInt(self.block_height as u64).consensus_encode(w)?;
		len += (self.path.len() as u8).consensus_encode(w)?;
		for level in self.path.iter() {
			len += VarInt(level.len() as u64).consensus_encode(w)?;
			for node in level.iter() {
				len += VarInt(node.offset).consensus_encode(w)?;
				len += node.flags().consensus_encode(w)?;
				if !node.duplicate {
					if let Some(hash) = node.hash {
						len += hash.consensus_encode(w)?;
					}
				}
			}
		}
		Ok(len)
	}
}

impl Decodable for MerklePath {
	fn consensus_decode<R: Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
		let block_height = VarInt::consensus_decode(r)?.0;
		let block_height = u32::try_from(block_height)
			.map_err(|_| encode::Error::ParseFailed("BUMP block height out of range"))?;
		let tree_height = u8::consensus_decode(r)?;
		let mut path = Vec::new();
		for _ in 0..tree_height {
			let count = VarInt::consensus_decode(r)?.0;
			let mut level = Vec::new();
			for _ in 0..count {
				let offset = VarInt::consensus_decode(r)?.0;
				let flags = u8::consensus_decode(r)?;
				let node = match flags {
					0 => PathElement::with_hash(offset, TxMerkleNode::consensus_decode(r)?),
					FLAG_DUPLICATE => PathElement::duplicate(offset),
					FLAG_TXID => PathElement {
						offset,
						hash: Some(TxMerkleNode::consensus_decode(r)?),
						txid: true,
						duplicate: false,
					},
					_ => return Err(encode::Error::ParseFailed("unknown BUMP node flags")),
				};
				level.push(node);
			}
			path.push(level);
		}
		MerklePath::new(block_height, path)
			.map_err(|_| encode::Error::ParseFailed("inconsistent BUMP levels"))
	}
}
