// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Error types live here.

use crate::envelope::merkle_path::MerkleProofError;
use crate::envelope::EnvelopeError;
use crate::wallet::WalletError;

use core::fmt;

/// An error returned by the payment operations of this crate.
///
/// Every variant carries the offending value or the underlying cause so that automated callers
/// can react to it without parsing the [`fmt::Display`] output. Use [`PaymentError::kind`] to
/// match on the category alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentError {
	/// The recipient was not given as a compressed public key. BRC-29 derivation needs the
	/// recipient's identity key, a hashed address is not enough.
	InvalidRecipientFormat {
		/// The rejected recipient string.
		value: String,
	},
	/// A sender identity key did not have the compressed public key format.
	InvalidSenderFormat {
		/// The rejected sender string.
		value: String,
	},
	/// A payment amount of zero satoshis was requested.
	InvalidAmount {
		/// The rejected amount.
		satoshis: u64,
	},
	/// The envelope could not be decoded or did not bind to its terminal transaction.
	MalformedEnvelope(EnvelopeError),
	/// The output to claim does not exist in the envelope's terminal transaction.
	InvalidOutputIndex {
		/// The requested output index.
		index: u32,
		/// The number of outputs of the terminal transaction.
		output_count: usize,
	},
	/// The wallet did not produce a funding transaction, e.g. because of insufficient funds.
	FundingFailed {
		/// A human-readable error message
		reason: String,
	},
	/// A merkle path could not be rebuilt from a block explorer proof.
	ProofReconstruction(MerkleProofError),
	/// The BRC-42 tweak for the given derivation tag was not a valid scalar or produced the point
	/// at infinity. This happens with negligible probability, a fresh tag resolves it.
	KeyDerivation,
	/// The wallet collaborator reported a failure, passed through verbatim.
	Wallet(WalletError),
}

/// The category of a [`PaymentError`], without its context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// See [`PaymentError::InvalidRecipientFormat`].
	InvalidRecipientFormat,
	/// See [`PaymentError::InvalidSenderFormat`].
	InvalidSenderFormat,
	/// See [`PaymentError::InvalidAmount`].
	InvalidAmount,
	/// See [`PaymentError::MalformedEnvelope`].
	MalformedEnvelope,
	/// See [`PaymentError::InvalidOutputIndex`].
	InvalidOutputIndex,
	/// See [`PaymentError::FundingFailed`].
	FundingFailed,
	/// See [`PaymentError::ProofReconstruction`].
	ProofReconstructionError,
	/// See [`PaymentError::KeyDerivation`].
	KeyDerivation,
	/// See [`PaymentError::Wallet`].
	Wallet,
}

impl PaymentError {
	/// Returns the category of this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::InvalidRecipientFormat { .. } => ErrorKind::InvalidRecipientFormat,
			Self::InvalidSenderFormat { .. } => ErrorKind::InvalidSenderFormat,
			Self::InvalidAmount { .. } => ErrorKind::InvalidAmount,
			Self::MalformedEnvelope(_) => ErrorKind::MalformedEnvelope,
			Self::InvalidOutputIndex { .. } => ErrorKind::InvalidOutputIndex,
			Self::FundingFailed { .. } => ErrorKind::FundingFailed,
			Self::ProofReconstruction(_) => ErrorKind::ProofReconstructionError,
			Self::KeyDerivation => ErrorKind::KeyDerivation,
			Self::Wallet(_) => ErrorKind::Wallet,
		}
	}
}

impl fmt::Display for PaymentError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::InvalidRecipientFormat { value } => write!(
				f,
				"Recipient {:?} must be a compressed public key (66 hex characters starting with 02 or 03) for BRC-29 payments. Raw addresses are not supported, the recipient must share their identity key",
				value
			),
			Self::InvalidSenderFormat { value } => {
				write!(f, "Sender identity key {:?} is not a valid compressed public key", value)
			},
			Self::InvalidAmount { satoshis } => {
				write!(f, "Payment amount must be a positive number of satoshis, got {}", satoshis)
			},
			Self::MalformedEnvelope(e) => write!(f, "Malformed payment envelope: {}", e),
			Self::InvalidOutputIndex { index, output_count } => write!(
				f,
				"Output index {} is out of range, the payment transaction has {} outputs",
				index, output_count
			),
			Self::FundingFailed { reason } => write!(f, "Funding transaction failed: {}", reason),
			Self::ProofReconstruction(e) => write!(f, "Could not rebuild merkle path: {}", e),
			Self::KeyDerivation => write!(f, "Derivation tag produced an invalid payment key"),
			Self::Wallet(e) => write!(f, "{}", e),
		}
	}
}

impl std::error::Error for PaymentError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::MalformedEnvelope(e) => Some(e),
			Self::ProofReconstruction(e) => Some(e),
			Self::Wallet(e) => Some(e),
			_ => None,
		}
	}
}

impl From<EnvelopeError> for PaymentError {
	fn from(e: EnvelopeError) -> Self {
		Self::MalformedEnvelope(e)
	}
}

impl From<MerkleProofError> for PaymentError {
	fn from(e: MerkleProofError) -> Self {
		Self::ProofReconstruction(e)
	}
}

impl From<WalletError> for PaymentError {
	fn from(e: WalletError) -> Self {
		Self::Wallet(e)
	}
}
