// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Importing outputs paid to the wallet by a plain transaction, e.g. from a faucet or an exchange.

use bitcoin::Txid;

use serde::Serialize;

use crate::chain::{BlockExplorer, ExplorerError};
use crate::envelope::{encode_atomic, BundledTransaction};
use crate::identity::IdentityKey;
use crate::payment::normalize_description;
use crate::util::config::PaymentConfig;
use crate::util::errors::PaymentError;
use crate::util::logger::{Logger, WithContext};
use crate::wallet::{
	InternalizeOutput, InternalizeRequest, PaymentRemittance, WalletInterface,
	WALLET_PAYMENT_PROTOCOL,
};

use core::fmt;
use core::ops::Deref;

/// Derivation prefix recorded for imported outputs. They are not locked with a derived key, the
/// remittance only lets the wallet account for them.
pub const IMPORT_DERIVATION_PREFIX: &str = "imported";

/// Number of leading txid hex characters used as derivation suffix of an imported output.
const IMPORT_SUFFIX_LEN: usize = 16;

/// An output brought into the wallet by [`import_external_output`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
	/// The funding transaction.
	pub txid: Txid,
	/// The imported output's index.
	pub vout: u32,
	/// The imported output's value.
	pub satoshis: u64,
	/// Height of the block confirming the funding transaction.
	pub block_height: u32,
	/// Confirmations of the funding transaction when it was imported.
	pub confirmations: u32,
	/// Whether the wallet took the output.
	pub accepted: bool,
}

/// An error importing an external output.
#[derive(Debug)]
pub enum ImportError {
	/// The funding transaction does not have enough confirmations to carry a merkle proof.
	Unconfirmed {
		/// The funding transaction.
		txid: Txid,
		/// Its current number of confirmations.
		confirmations: u32,
		/// The number of confirmations required.
		required: u32,
	},
	/// The explorer reports confirmations but no block height.
	MissingBlockHeight {
		/// The funding transaction.
		txid: Txid,
	},
	/// The funding transaction has no output at the requested index.
	OutputNotFound {
		/// The requested output index.
		vout: u32,
		/// The number of outputs of the funding transaction.
		output_count: usize,
	},
	/// The explorer has no merkle proof for the funding transaction.
	NoProof {
		/// The funding transaction.
		txid: Txid,
	},
	/// The explorer served a different transaction than the one requested.
	TxidMismatch {
		/// The requested transaction.
		expected: Txid,
		/// The id of the transaction served.
		found: Txid,
	},
	/// The block explorer could not be queried.
	Explorer(ExplorerError),
	/// The proof could not be turned into an envelope, or the wallet refused it.
	Payment(PaymentError),
}

impl fmt::Display for ImportError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Unconfirmed { txid, confirmations, required } => write!(
				f,
				"Transaction {} is unconfirmed ({} confirmations). Wait for at least {} confirmation(s) before importing",
				txid, confirmations, required
			),
			Self::MissingBlockHeight { txid } => {
				write!(f, "No block height reported for confirmed transaction {}", txid)
			},
			Self::OutputNotFound { vout, output_count } => write!(
				f,
				"Output index {} not found in transaction (has {} outputs)",
				vout, output_count
			),
			Self::NoProof { txid } => {
				write!(f, "No merkle proof available for transaction {}", txid)
			},
			Self::TxidMismatch { expected, found } => {
				write!(f, "Requested transaction {} but the explorer served {}", expected, found)
			},
			Self::Explorer(e) => write!(f, "{}", e),
			Self::Payment(e) => write!(f, "Failed to import output: {}", e),
		}
	}
}

impl std::error::Error for ImportError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Explorer(e) => Some(e),
			Self::Payment(e) => Some(e),
			_ => None,
		}
	}
}

impl From<ExplorerError> for ImportError {
	fn from(e: ExplorerError) -> Self {
		Self::Explorer(e)
	}
}

impl From<PaymentError> for ImportError {
	fn from(e: PaymentError) -> Self {
		Self::Payment(e)
	}
}

/// Imports output `vout` of the confirmed transaction `txid`, which pays the wallet directly,
/// e.g. to `identity_key`'s P2PKH address.
///
/// The transaction and its TSC proof are fetched from `explorer`. The proof is rebuilt into a
/// merkle path and the transaction is handed to the wallet alone in an Atomic BEEF, with a
/// remittance naming the wallet itself as sender.
pub fn import_external_output<E: Deref, W: Deref, L: Deref>(
	explorer: &E, wallet: &W, identity_key: &IdentityKey, txid: &Txid, vout: u32,
	config: &PaymentConfig, logger: &L,
) -> Result<ImportResult, ImportError>
where
	E::Target: BlockExplorer,
	W::Target: WalletInterface,
	L::Target: Logger,
{
	let logger = WithContext::from(logger, Some(*txid));

	let status = explorer.transaction_status(txid)?;
	let required = config.min_import_confirmations.max(1);
	if status.confirmations < required {
		log_warn!(
			logger,
			"Not importing output {} with {} confirmations",
			vout,
			status.confirmations
		);
		return Err(ImportError::Unconfirmed {
			txid: *txid,
			confirmations: status.confirmations,
			required,
		});
	}
	let block_height = status.block_height.ok_or(ImportError::MissingBlockHeight { txid: *txid })?;

	let tx = explorer.raw_transaction(txid)?;
	let found = tx.compute_txid();
	if found != *txid {
		log_error!(logger, "Explorer served transaction {} instead", found);
		return Err(ImportError::TxidMismatch { expected: *txid, found });
	}
	let satoshis = match tx.output.get(vout as usize) {
		Some(output) => output.value.to_sat(),
		None => return Err(ImportError::OutputNotFound { vout, output_count: tx.output.len() }),
	};

	let proof = match explorer.tsc_proofs(txid)?.into_iter().next() {
		Some(proof) => proof,
		None => return Err(ImportError::NoProof { txid: *txid }),
	};
	let merkle_path = proof.to_merkle_path(txid, block_height).map_err(PaymentError::from)?;
	let root = merkle_path.compute_root(txid).map_err(PaymentError::from)?;
	log_debug!(
		logger,
		"Rebuilt merkle path of height {} at block {} with root {}",
		merkle_path.path.len(),
		block_height,
		root
	);

	let envelope = encode_atomic(&[BundledTransaction::mined(tx, merkle_path)], txid)
		.map_err(PaymentError::from)?;
	let hex_txid = txid.to_string();
	let request = InternalizeRequest {
		tx: envelope,
		outputs: vec![InternalizeOutput {
			output_index: vout,
			protocol: WALLET_PAYMENT_PROTOCOL.to_owned(),
			payment_remittance: PaymentRemittance {
				derivation_prefix: IMPORT_DERIVATION_PREFIX.to_owned(),
				derivation_suffix: hex_txid[..IMPORT_SUFFIX_LEN].to_owned(),
				sender_identity_key: *identity_key,
			},
		}],
		description: normalize_description(&config.import_description),
	};

	let outcome = wallet.internalize_payment(request).map_err(|e| {
		log_error!(logger, "Wallet refused imported output {}: {}", vout, e);
		PaymentError::Wallet(e)
	})?;
	log_info!(
		logger,
		"Imported output {} worth {} sats from block {}, accepted: {}",
		vout,
		satoshis,
		block_height,
		outcome.accepted
	);

	Ok(ImportResult {
		txid: *txid,
		vout,
		satoshis,
		block_height,
		confirmations: status.confirmations,
		accepted: outcome.accepted,
	})
}
