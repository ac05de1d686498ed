// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The interface to the wallet which funds outgoing payments and claims incoming ones.
//!
//! Coin selection, signing, broadcasting, storage and the SPV verification of incoming envelopes
//! all happen behind [`WalletInterface`]. The requests mirror the BRC-100 `createAction` and
//! `internalizeAction` calls and serialize to their JSON argument shapes.

use bitcoin::ScriptBuf;

use serde::{Deserialize, Serialize};

use crate::identity::IdentityKey;

use core::fmt;

/// Internalization protocol for outputs locked with a BRC-29 derived key.
pub const WALLET_PAYMENT_PROTOCOL: &str = "wallet payment";

/// Request to create, sign and broadcast a transaction paying `satoshis` to `locking_script`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingOutputRequest {
	/// The script of the payment output.
	pub locking_script: ScriptBuf,
	/// The value of the payment output.
	pub satoshis: u64,
	/// Description of the action, 5 to 50 characters.
	pub description: String,
	/// Description of the payment output.
	pub output_description: String,
	/// Labels attached to the action.
	pub labels: Vec<String>,
	/// Tags attached to the payment output.
	pub tags: Vec<String>,
	/// JSON kept with the output so the wallet can later show how it was derived,
	/// `{"derivationPrefix", "derivationSuffix", "type": "BRC29"}`.
	pub custom_instructions: String,
	/// Whether the wallet may shuffle outputs. Always `false` so the payment output keeps its
	/// position.
	pub randomize_outputs: bool,
	/// Whether the wallet may return before the transaction is broadcast. Always `false`.
	pub accept_delayed_broadcast: bool,
}

/// The derivation data letting a recipient's wallet re-derive the key of a BRC-29 output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRemittance {
	/// The derivation prefix chosen by the sender.
	pub derivation_prefix: String,
	/// The derivation suffix chosen by the sender.
	pub derivation_suffix: String,
	/// The sender's identity key.
	pub sender_identity_key: IdentityKey,
}

/// An output of an envelope to claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalizeOutput {
	/// Index of the output in the envelope's terminal transaction.
	pub output_index: u32,
	/// How the output is claimed, [`WALLET_PAYMENT_PROTOCOL`] for BRC-29 payments.
	pub protocol: String,
	/// The derivation data of the output.
	pub payment_remittance: PaymentRemittance,
}

/// Request to verify an envelope and claim some of its outputs into the wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalizeRequest {
	/// The Atomic BEEF bytes.
	pub tx: Vec<u8>,
	/// The outputs to claim.
	pub outputs: Vec<InternalizeOutput>,
	/// Description of the action, 5 to 50 characters.
	pub description: String,
}

/// The wallet's answer to an [`InternalizeRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalizeOutcome {
	/// Whether the outputs were verified and claimed.
	pub accepted: bool,
}

/// A failure reported by the wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletError {
	/// The wallet's own description of the failure.
	pub message: String,
}

impl WalletError {
	/// Creates an error from the wallet's message.
	pub fn new<S: Into<String>>(message: S) -> Self {
		WalletError { message: message.into() }
	}
}

impl fmt::Display for WalletError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(&self.message)
	}
}

impl std::error::Error for WalletError {}

/// The subset of a wallet's capabilities the payment flow relies on.
pub trait WalletInterface {
	/// Creates, signs and broadcasts a transaction funding the requested output, returning the
	/// transaction as BEEF (atomic or not) with its unconfirmed ancestry.
	///
	/// `Ok(None)` means the wallet produced no transaction, e.g. for lack of funds.
	fn create_funding_output(
		&self, request: FundingOutputRequest,
	) -> Result<Option<Vec<u8>>, WalletError>;

	/// Verifies the envelope, including merkle proofs, and claims the requested outputs.
	fn internalize_payment(
		&self, request: InternalizeRequest,
	) -> Result<InternalizeOutcome, WalletError>;
}
