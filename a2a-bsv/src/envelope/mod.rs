// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Payment envelopes in the Atomic BEEF format (BRC-62, BRC-95, BRC-96).
//!
//! A BEEF bundles a transaction with every unconfirmed ancestor, down to ancestors which carry a
//! [`MerklePath`] into a block, so the receiver can validate it without looking anything up. The
//! atomic form prefixes the bundle with the id of the one transaction it attests to, which is
//! always the last one in the bundle.
//!
//! Envelopes travel as standard base64 strings, see [`to_transport_string`].

pub mod merkle_path;

use bitcoin::consensus::encode::{self, Decodable, Encodable, VarInt};
use bitcoin::io::{Read, Write};
use bitcoin::{Transaction, Txid};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::envelope::merkle_path::{MerklePath, MerkleProofError};

use core::fmt;
use std::collections::{HashMap, HashSet};

pub use crate::envelope::merkle_path::{PathElement, PathLevel};

/// Version marker of a BEEF V1 bundle, `0100BEEF` on the wire.
pub const BEEF_V1: u32 = 0xEFBE_0001;
/// Version marker of a BEEF V2 bundle, `0200BEEF` on the wire.
pub const BEEF_V2: u32 = 0xEFBE_0002;
/// Prefix marking an Atomic BEEF, followed by the subject transaction id.
pub const ATOMIC_BEEF: u32 = 0x0101_0101;

/// BEEF V2 transaction entry carrying the raw transaction only.
const FORMAT_RAW_TX: u8 = 0;
/// BEEF V2 transaction entry carrying a bump index and the raw transaction.
const FORMAT_RAW_TX_AND_BUMP_INDEX: u8 = 1;
/// BEEF V2 transaction entry carrying only a transaction id the receiver already knows.
const FORMAT_TXID_ONLY: u8 = 2;

/// An error decoding or encoding a payment envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvelopeError {
	/// The transport string is not valid base64.
	InvalidTransportEncoding(String),
	/// The envelope contains no bytes or no transactions.
	Empty,
	/// The envelope ended in the middle of a structure.
	Truncated,
	/// The envelope bytes could not be parsed.
	Decode(String),
	/// The bundle version is neither BEEF V1 nor V2.
	UnknownVersion(u32),
	/// Bytes remain after the last transaction.
	TrailingBytes {
		/// The number of unread bytes.
		remaining: usize,
	},
	/// A transaction refers to a merkle path the bundle does not contain.
	InvalidBumpIndex {
		/// The transaction.
		txid: Txid,
		/// The out of range index.
		index: u64,
	},
	/// A transaction's merkle path does not include it as a leaf.
	MerklePathMismatch {
		/// The transaction.
		txid: Txid,
	},
	/// A transaction without a merkle path spends an output of a transaction the bundle lacks.
	MissingAncestor {
		/// The spending transaction.
		txid: Txid,
		/// The transaction that should have been bundled.
		missing: Txid,
	},
	/// The atomic prefix names a different transaction than the last in the bundle.
	AtomicTxidMismatch {
		/// The transaction id named by the atomic prefix.
		expected: Txid,
		/// The id of the last bundled transaction.
		found: Txid,
	},
	/// The terminal transaction is only referenced by id, so its outputs are unknown.
	TxidOnlyTerminal {
		/// The terminal transaction id.
		txid: Txid,
	},
	/// The transaction to encode an envelope for is not among the given transactions.
	UnknownTerminal {
		/// The requested terminal transaction id.
		txid: Txid,
	},
	/// A merkle path attached to a transaction is invalid.
	InvalidMerklePath(MerkleProofError),
}

impl fmt::Display for EnvelopeError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::InvalidTransportEncoding(e) => write!(f, "envelope is not valid base64: {}", e),
			Self::Empty => write!(f, "BEEF contains no transactions"),
			Self::Truncated => write!(f, "BEEF is truncated"),
			Self::Decode(e) => write!(f, "{}", e),
			Self::UnknownVersion(v) => write!(f, "unknown BEEF version {:#010x}", v),
			Self::TrailingBytes { remaining } => {
				write!(f, "{} unexpected bytes after the last transaction", remaining)
			},
			Self::InvalidBumpIndex { txid, index } => {
				write!(f, "transaction {} refers to missing merkle path {}", txid, index)
			},
			Self::MerklePathMismatch { txid } => {
				write!(f, "merkle path of transaction {} does not contain it", txid)
			},
			Self::MissingAncestor { txid, missing } => {
				write!(f, "transaction {} spends {} which is not in the BEEF", txid, missing)
			},
			Self::AtomicTxidMismatch { expected, found } => write!(
				f,
				"Could not find atomic transaction in BEEF: expected {} as the last transaction, found {}",
				expected, found
			),
			Self::TxidOnlyTerminal { txid } => {
				write!(f, "terminal transaction {} is included by id only", txid)
			},
			Self::UnknownTerminal { txid } => {
				write!(f, "transaction {} is not among the transactions to encode", txid)
			},
			Self::InvalidMerklePath(e) => write!(f, "invalid merkle path: {}", e),
		}
	}
}

impl std::error::Error for EnvelopeError {}

impl From<encode::Error> for EnvelopeError {
	fn from(e: encode::Error) -> Self {
		match e {
			encode::Error::Io(ref io_err)
				if io_err.kind() == bitcoin::io::ErrorKind::UnexpectedEof =>
			{
				EnvelopeError::Truncated
			},
			e => EnvelopeError::Decode(e.to_string()),
		}
	}
}

impl From<MerkleProofError> for EnvelopeError {
	fn from(e: MerkleProofError) -> Self {
		EnvelopeError::InvalidMerklePath(e)
	}
}

/// A transaction carried in an envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BundledTransaction {
	/// The full transaction, with a merkle path if it is mined.
	Full {
		/// The transaction.
		tx: Transaction,
		/// Proof of the transaction's inclusion in a block. Transactions without one must have
		/// all their inputs' transactions bundled as well.
		merkle_path: Option<MerklePath>,
	},
	/// A transaction the receiver is expected to already know, referenced by id.
	TxidOnly(Txid),
}

impl BundledTransaction {
	/// An unmined transaction.
	pub fn unmined(tx: Transaction) -> Self {
		BundledTransaction::Full { tx, merkle_path: None }
	}

	/// A mined transaction with its merkle path.
	pub fn mined(tx: Transaction, merkle_path: MerklePath) -> Self {
		BundledTransaction::Full { tx, merkle_path: Some(merkle_path) }
	}

	/// The id of the transaction.
	pub fn txid(&self) -> Txid {
		match self {
			BundledTransaction::Full { tx, .. } => tx.compute_txid(),
			BundledTransaction::TxidOnly(txid) => *txid,
		}
	}

	/// The full transaction, unless only its id is bundled.
	pub fn transaction(&self) -> Option<&Transaction> {
		match self {
			BundledTransaction::Full { tx, .. } => Some(tx),
			BundledTransaction::TxidOnly(_) => None,
		}
	}

	/// The merkle path of the transaction, if bundled.
	pub fn merkle_path(&self) -> Option<&MerklePath> {
		match self {
			BundledTransaction::Full { merkle_path, .. } => merkle_path.as_ref(),
			BundledTransaction::TxidOnly(_) => None,
		}
	}
}

/// A decoded envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
	/// The bundled transactions, ancestors before the transactions spending them.
	pub transactions: Vec<BundledTransaction>,
	/// The transaction the envelope attests to.
	pub terminal_txid: Txid,
}

impl Envelope {
	/// Decodes an envelope from its transport string.
	pub fn from_transport_string(s: &str) -> Result<Self, EnvelopeError> {
		decode(&from_transport_string(s)?)
	}

	/// The transaction the envelope attests to.
	pub fn terminal_transaction(&self) -> Option<&Transaction> {
		self.transactions
			.iter()
			.rev()
			.find(|t| t.txid() == self.terminal_txid)
			.and_then(|t| t.transaction())
	}

	/// Number of outputs of the terminal transaction.
	pub fn output_count(&self) -> usize {
		self.terminal_transaction().map_or(0, |tx| tx.output.len())
	}

	/// Re-encodes the envelope as an Atomic BEEF.
	pub fn encode_atomic(&self) -> Result<Vec<u8>, EnvelopeError> {
		encode_atomic(&self.transactions, &self.terminal_txid)
	}
}

/// Encodes envelope bytes for transport.
pub fn to_transport_string(bytes: &[u8]) -> String {
	STANDARD.encode(bytes)
}

/// Decodes envelope bytes from their transport string. Surrounding whitespace is ignored.
pub fn from_transport_string(s: &str) -> Result<Vec<u8>, EnvelopeError> {
	STANDARD.decode(s.trim()).map_err(|e| EnvelopeError::InvalidTransportEncoding(e.to_string()))
}

enum RawEntry {
	Full(Transaction, Option<u64>),
	TxidOnly(Txid),
}

/// A BEEF as laid out on the wire, before bump indexes are resolved and ancestry is checked.
struct RawBeef {
	atomic_txid: Option<Txid>,
	bumps: Vec<MerklePath>,
	entries: Vec<RawEntry>,
}

impl Decodable for RawBeef {
	fn consensus_decode<R: Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
		let mut atomic_txid = None;
		let mut version = u32::consensus_decode(r)?;
		if version == ATOMIC_BEEF {
			atomic_txid = Some(Txid::consensus_decode(r)?);
			version = u32::consensus_decode(r)?;
		}
		if version != BEEF_V1 && version != BEEF_V2 {
			return Err(encode::Error::ParseFailed("unknown BEEF version"));
		}

		let bump_count = VarInt::consensus_decode(r)?.0;
		let mut bumps = Vec::new();
		for _ in 0..bump_count {
			bumps.push(MerklePath::consensus_decode(r)?);
		}

		let tx_count = VarInt::consensus_decode(r)?.0;
		let mut entries = Vec::new();
		for _ in 0..tx_count {
			let entry = if version == BEEF_V1 {
				let tx = Transaction::consensus_decode(r)?;
				match u8::consensus_decode(r)? {
					0 => RawEntry::Full(tx, None),
					1 => RawEntry::Full(tx, Some(VarInt::consensus_decode(r)?.0)),
					_ => return Err(encode::Error::ParseFailed("invalid BEEF bump marker")),
				}
			} else {
				match u8::consensus_decode(r)? {
					FORMAT_RAW_TX => RawEntry::Full(Transaction::consensus_decode(r)?, None),
					FORMAT_RAW_TX_AND_BUMP_INDEX => {
						let index = VarInt::consensus_decode(r)?.0;
						RawEntry::Full(Transaction::consensus_decode(r)?, Some(index))
					},
					FORMAT_TXID_ONLY => RawEntry::TxidOnly(Txid::consensus_decode(r)?),
					_ => return Err(encode::Error::ParseFailed("invalid BEEF transaction format")),
				}
			};
			entries.push(entry);
		}
		Ok(RawBeef { atomic_txid, bumps, entries })
	}
}

/// Reads the BEEF version, skipping an atomic prefix.
fn peek_version(bytes: &[u8]) -> Option<u32> {
	let read_u32 = |at: usize| {
		bytes.get(at..at + 4).and_then(|b| <[u8; 4]>::try_from(b).ok()).map(u32::from_le_bytes)
	};
	match read_u32(0)? {
		ATOMIC_BEEF => read_u32(36),
		version => Some(version),
	}
}

/// Decodes an Atomic BEEF, or a plain BEEF whose last transaction is taken as terminal.
///
/// Fails if the bundle is empty or truncated, if a transaction without a merkle path spends a
/// transaction missing from the bundle, or if the atomic prefix does not name the last
/// transaction.
pub fn decode(bytes: &[u8]) -> Result<Envelope, EnvelopeError> {
	if bytes.is_empty() {
		return Err(EnvelopeError::Empty);
	}
	if let Some(version) = peek_version(bytes) {
		if version != BEEF_V1 && version != BEEF_V2 {
			return Err(EnvelopeError::UnknownVersion(version));
		}
	}

	let (raw, consumed) = encode::deserialize_partial::<RawBeef>(bytes)?;
	if consumed != bytes.len() {
		return Err(EnvelopeError::TrailingBytes { remaining: bytes.len() - consumed });
	}

	let mut transactions = Vec::with_capacity(raw.entries.len());
	for entry in raw.entries {
		match entry {
			RawEntry::TxidOnly(txid) => transactions.push(BundledTransaction::TxidOnly(txid)),
			RawEntry::Full(tx, None) => transactions.push(BundledTransaction::unmined(tx)),
			RawEntry::Full(tx, Some(index)) => {
				let txid = tx.compute_txid();
				let merkle_path = usize::try_from(index)
					.ok()
					.and_then(|i| raw.bumps.get(i))
					.ok_or(EnvelopeError::InvalidBumpIndex { txid, index })?;
				if !merkle_path.contains_txid(&txid) {
					return Err(EnvelopeError::MerklePathMismatch { txid });
				}
				transactions.push(BundledTransaction::mined(tx, merkle_path.clone()));
			},
		}
	}

	let terminal_txid = match transactions.last() {
		Some(last) => last.txid(),
		None => return Err(EnvelopeError::Empty),
	};
	if let Some(expected) = raw.atomic_txid {
		if expected != terminal_txid {
			return Err(EnvelopeError::AtomicTxidMismatch { expected, found: terminal_txid });
		}
	}
	if let Some(BundledTransaction::TxidOnly(txid)) = transactions.last() {
		return Err(EnvelopeError::TxidOnlyTerminal { txid: *txid });
	}

	let known: HashSet<Txid> = transactions.iter().map(|t| t.txid()).collect();
	for bundled in transactions.iter() {
		if let BundledTransaction::Full { tx, merkle_path: None } = bundled {
			if tx.is_coinbase() {
				continue;
			}
			for input in tx.input.iter() {
				if !known.contains(&input.previous_output.txid) {
					return Err(EnvelopeError::MissingAncestor {
						txid: tx.compute_txid(),
						missing: input.previous_output.txid,
					});
				}
			}
		}
	}

	Ok(Envelope { transactions, terminal_txid })
}

/// An envelope ready to be written, with bump indexes assigned.
struct AtomicBeef<'a> {
	terminal_txid: Txid,
	version: u32,
	bumps: Vec<&'a MerklePath>,
	entries: Vec<(&'a BundledTransaction, Option<usize>)>,
}

impl<'a> Encodable for AtomicBeef<'a> {
	fn consensus_encode<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, bitcoin::io::Error> {
		let mut len = ATOMIC_BEEF.consensus_encode(w)?;
		len += self.terminal_txid.consensus_encode(w)?;
		len += self.version.consensus_encode(w)?;
		len += VarInt(self.bumps.len() as u64).consensus_encode(w)?;
		for bump in self.bumps.iter() {
			len += bump.consensus_encode(w)?;
		}
		len += VarInt(self.entries.len() as u64).consensus_encode(w)?;
		for (bundled, bump_index) in self.entries.iter() {
			match (bundled, self.version) {
				(BundledTransaction::Full { tx, .. }, BEEF_V1) => {
					len += tx.consensus_encode(w)?;
					match bump_index {
						Some(index) => {
							len += 1u8.consensus_encode(w)?;
							len += VarInt(*index as u64).consensus_encode(w)?;
						},
						None => len += 0u8.consensus_encode(w)?,
					}
				},
				(BundledTransaction::Full { tx, .. }, _) => match bump_index {
					Some(index) => {
						len += FORMAT_RAW_TX_AND_BUMP_INDEX.consensus_encode(w)?;
						len += VarInt(*index as u64).consensus_encode(w)?;
						len += tx.consensus_encode(w)?;
					},
					None => {
						len += FORMAT_RAW_TX.consensus_encode(w)?;
						len += tx.consensus_encode(w)?;
					},
				},
				(BundledTransaction::TxidOnly(txid), _) => {
					len += FORMAT_TXID_ONLY.consensus_encode(w)?;
					len += txid.consensus_encode(w)?;
				},
			}
		}
		Ok(len)
	}
}

fn push_with_ancestors<'a>(
	bundled: &'a BundledTransaction, by_txid: &HashMap<Txid, &'a BundledTransaction>,
	visited: &mut HashSet<Txid>, ordered: &mut Vec<&'a BundledTransaction>,
) -> Result<(), EnvelopeError> {
	let txid = bundled.txid();
	if !visited.insert(txid) {
		return Ok(());
	}
	if let BundledTransaction::Full { tx, merkle_path: None } = bundled {
		if !tx.is_coinbase() {
			for input in tx.input.iter() {
				let parent_txid = input.previous_output.txid;
				let parent = by_txid
					.get(&parent_txid)
					.ok_or(EnvelopeError::MissingAncestor { txid, missing: parent_txid })?;
				push_with_ancestors(parent, by_txid, visited, ordered)?;
			}
		}
	}
	ordered.push(bundled);
	Ok(())
}

/// Encodes an Atomic BEEF attesting to `terminal_txid`.
///
/// Only the ancestry needed to validate the terminal transaction is written: ancestors are
/// followed through inputs until a transaction carrying a merkle path, or bundled by id only, is
/// reached. Ancestors precede the transactions spending them and the terminal comes last. V1 is
/// used unless a transaction is bundled by id only, which needs V2.
pub fn encode_atomic(
	transactions: &[BundledTransaction], terminal_txid: &Txid,
) -> Result<Vec<u8>, EnvelopeError> {
	let by_txid: HashMap<Txid, &BundledTransaction> =
		transactions.iter().map(|t| (t.txid(), t)).collect();
	let terminal =
		by_txid.get(terminal_txid).ok_or(EnvelopeError::UnknownTerminal { txid: *terminal_txid })?;
	if terminal.transaction().is_none() {
		return Err(EnvelopeError::TxidOnlyTerminal { txid: *terminal_txid });
	}

	let mut visited = HashSet::new();
	let mut ordered = Vec::new();
	push_with_ancestors(terminal, &by_txid, &mut visited, &mut ordered)?;

	let mut bumps: Vec<&MerklePath> = Vec::new();
	let mut entries = Vec::with_capacity(ordered.len());
	for bundled in ordered {
		let bump_index = match bundled.merkle_path() {
			Some(path) => {
				path.validate().map_err(EnvelopeError::InvalidMerklePath)?;
				if !path.contains_txid(&bundled.txid()) {
					return Err(EnvelopeError::MerklePathMismatch { txid: bundled.txid() });
				}
				match bumps.iter().position(|b| *b == path) {
					Some(index) => Some(index),
					None => {
						bumps.push(path);
						Some(bumps.len() - 1)
					},
				}
			},
			None => None,
		};
		entries.push((bundled, bump_index));
	}

	let version = if entries.iter().any(|(b, _)| b.transaction().is_none()) {
		BEEF_V2
	} else {
		BEEF_V1
	};
	Ok(encode::serialize(&AtomicBeef { terminal_txid: *terminal_txid, version, bumps, entries }))
}
