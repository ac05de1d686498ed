// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Sending, checking and receiving BRC-29 payments.
//!
//! The sender's [`PaymentBuilder`] produces a [`PaymentResult`], which is handed to the recipient
//! out of band. The recipient may pre-check it with [`verify`] and claims it with
//! [`PaymentAcceptor`].
//!
//! [`PaymentBuilder`]: builder::PaymentBuilder
//! [`PaymentAcceptor`]: accept::PaymentAcceptor
//! [`verify`]: verify::verify

pub mod accept;
pub mod builder;
pub mod verify;

use bitcoin::Txid;

use serde::{Deserialize, Serialize};

use crate::identity::IdentityKey;

/// Shortest description wallets accept for an action.
pub const MIN_DESCRIPTION_LEN: usize = 5;
/// Longest description wallets accept for an action.
pub const MAX_DESCRIPTION_LEN: usize = 50;

/// Brings a free-text description into the 5 to 50 character range wallets require. Shorter
/// strings are padded with spaces, longer ones truncated. Lengths count characters, not bytes.
pub fn normalize_description(description: &str) -> String {
	let len = description.chars().count();
	if len < MIN_DESCRIPTION_LEN {
		format!("{:<width$}", description, width = MIN_DESCRIPTION_LEN)
	} else if len > MAX_DESCRIPTION_LEN {
		description.chars().take(MAX_DESCRIPTION_LEN).collect()
	} else {
		description.to_owned()
	}
}

/// Everything a recipient needs to claim a payment.
///
/// Losing any field makes the payment unclaimable by the recipient's wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
	/// The Atomic BEEF of the funding transaction, as a base64 transport string.
	#[serde(rename = "beef")]
	pub envelope: String,
	/// The id of the funding transaction.
	pub txid: Txid,
	/// The amount paid.
	pub satoshis: u64,
	/// The derivation prefix of the payment key.
	pub derivation_prefix: String,
	/// The derivation suffix of the payment key.
	pub derivation_suffix: String,
	/// The sender's identity key.
	pub sender_identity_key: IdentityKey,
}

/// The outcome of [`verify`].
///
/// [`verify`]: verify::verify
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
	/// Whether no error was found.
	pub valid: bool,
	/// The terminal transaction id, `None` (an empty string in JSON) if the envelope did not
	/// decode.
	#[serde(with = "txid_or_empty")]
	pub txid: Option<Txid>,
	/// The number of outputs of the terminal transaction, 0 if the envelope did not decode.
	pub output_count: usize,
	/// Every problem found.
	pub errors: Vec<String>,
}

/// The outcome of [`PaymentAcceptor::accept`].
///
/// [`PaymentAcceptor::accept`]: accept::PaymentAcceptor::accept
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptResult {
	/// Whether the wallet verified and claimed the output.
	pub accepted: bool,
}

mod txid_or_empty {
	use bitcoin::Txid;
	use serde::de::Error as _;
	use serde::{Deserialize, Deserializer, Serializer};

	use core::str::FromStr;

	pub fn serialize<S: Serializer>(txid: &Option<Txid>, serializer: S) -> Result<S::Ok, S::Error> {
		match txid {
			Some(txid) => serializer.collect_str(txid),
			None => serializer.serialize_str(""),
		}
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(
		deserializer: D,
	) -> Result<Option<Txid>, D::Error> {
		let s = String::deserialize(deserializer)?;
		if s.is_empty() {
			return Ok(None);
		}
		Txid::from_str(&s).map(Some).map_err(D::Error::custom)
	}
}
