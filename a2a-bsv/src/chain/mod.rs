// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Chain data used to import outputs paid to the wallet from outside the BRC-29 flow.
//!
//! Such outputs arrive without an envelope, so the transaction and a merkle proof are fetched
//! from a block explorer implementing [`BlockExplorer`], and turned into an envelope the wallet
//! can internalize.

pub mod convert;
pub mod import;
pub mod tsc;

use bitcoin::{Transaction, Txid};

use serde::Deserialize;

use core::fmt;

use crate::chain::tsc::TscProof;

/// Abstract type for a block explorer able to serve transactions and TSC merkle proofs.
pub trait BlockExplorer {
	/// Returns the confirmation status of a transaction.
	fn transaction_status(&self, txid: &Txid) -> Result<TransactionStatus, ExplorerError>;

	/// Returns a transaction by id.
	fn raw_transaction(&self, txid: &Txid) -> Result<Transaction, ExplorerError>;

	/// Returns the TSC merkle proofs known for a transaction, empty if it is not mined yet.
	fn tsc_proofs(&self, txid: &Txid) -> Result<Vec<TscProof>, ExplorerError>;
}

/// Confirmation status of a transaction, as reported by a block explorer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TransactionStatus {
	/// Number of blocks confirming the transaction, 0 while it is unconfirmed.
	#[serde(default)]
	pub confirmations: u32,
	/// Height of the block containing the transaction.
	#[serde(rename = "blockheight", default)]
	pub block_height: Option<u32>,
}

/// Error type for requests made to a [`BlockExplorer`].
///
/// Transient errors may be resolved when retrying a request, persistent ones will not.
#[derive(Debug)]
pub struct ExplorerError {
	kind: ExplorerErrorKind,
	error: Box<dyn std::error::Error + Send + Sync>,
}

/// The kind of `ExplorerError`, either persistent or transient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExplorerErrorKind {
	/// Indicates an error that won't resolve when retrying a request (e.g., invalid data).
	Persistent,

	/// Indicates an error that may resolve when retrying a request (e.g., unresponsive).
	Transient,
}

impl ExplorerError {
	/// Creates a new persistent error originated from the given error.
	pub fn persistent<E>(error: E) -> Self
	where
		E: Into<Box<dyn std::error::Error + Send + Sync>>,
	{
		Self { kind: ExplorerErrorKind::Persistent, error: error.into() }
	}

	/// Creates a new transient error originated from the given error.
	pub fn transient<E>(error: E) -> Self
	where
		E: Into<Box<dyn std::error::Error + Send + Sync>>,
	{
		Self { kind: ExplorerErrorKind::Transient, error: error.into() }
	}

	/// Returns the kind of error.
	pub fn kind(&self) -> ExplorerErrorKind {
		self.kind
	}

	/// Converts the error into the underlying error.
	pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync> {
		self.error
	}
}

impl fmt::Display for ExplorerError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.kind {
			ExplorerErrorKind::Persistent => write!(f, "block explorer error: {}", self.error),
			ExplorerErrorKind::Transient => {
				write!(f, "temporary block explorer error: {}", self.error)
			},
		}
	}
}

impl std::error::Error for ExplorerError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(&*self.error)
	}
}
