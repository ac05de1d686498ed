// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! BRC-29 payment key derivation.
//!
//! A payment output is locked to a one-time key which both parties can compute from their own
//! private key and the other party's identity key (BRC-42), scoped by a BRC-43 invoice number
//! built from a random [`DerivationTag`]. The sender only learns the public half; the recipient
//! derives the matching private key with [`derive_spending_key`].

use bitcoin::hashes::{sha256, Hash, HashEngine, Hmac, HmacEngine};
use bitcoin::secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey, Verification};
use bitcoin::{PubkeyHash, ScriptBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::identity::IdentityKey;
use crate::sign::EntropySource;
use crate::util::errors::PaymentError;

use core::ops::Deref;
use core::str::FromStr;

/// BRC-43 protocol id of the BRC-29 payment protocol.
pub const BRC29_PROTOCOL_ID: &str = "3241645161d8";

/// BRC-43 security level of BRC-29 derivations: keys are scoped to both the protocol and the
/// counterparty.
pub const BRC29_SECURITY_LEVEL: u8 = 2;

/// Number of random bytes in each half of a [`DerivationTag`].
pub const DERIVATION_SEGMENT_LEN: usize = 8;

/// The random `(prefix, suffix)` pair scoping a single payment's key derivation.
///
/// Both halves are base64 strings. The recipient needs the exact strings the sender used, so they
/// travel with the payment envelope.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DerivationTag {
	/// The derivation prefix.
	pub prefix: String,
	/// The derivation suffix.
	pub suffix: String,
}

impl DerivationTag {
	/// Creates a tag from strings received alongside a payment.
	pub fn new(prefix: String, suffix: String) -> Self {
		DerivationTag { prefix, suffix }
	}

	/// Generates a fresh tag with [`DERIVATION_SEGMENT_LEN`] random bytes per half.
	///
	/// Every payment attempt, including a retry of a failed one, must use a freshly generated tag.
	pub fn generate<ES: Deref>(entropy_source: &ES) -> Self
	where
		ES::Target: EntropySource,
	{
		let prefix = entropy_source.get_secure_random_bytes();
		let suffix = entropy_source.get_secure_random_bytes();
		DerivationTag {
			prefix: STANDARD.encode(&prefix[..DERIVATION_SEGMENT_LEN]),
			suffix: STANDARD.encode(&suffix[..DERIVATION_SEGMENT_LEN]),
		}
	}

	/// The BRC-43 key id, `"<prefix> <suffix>"`.
	pub fn key_id(&self) -> String {
		format!("{} {}", self.prefix, self.suffix)
	}

	/// The BRC-43 invoice number the payment key is derived under.
	pub fn invoice_number(&self) -> String {
		format!("{}-{}-{}", BRC29_SECURITY_LEVEL, BRC29_PROTOCOL_ID, self.key_id())
	}
}

/// Computes the BRC-42 tweak: HMAC-SHA256 keyed with the compressed ECDH point over the invoice
/// number.
fn invoice_tweak<C: Verification>(
	secp_ctx: &Secp256k1<C>, own_key: &SecretKey, counterparty: &PublicKey, tag: &DerivationTag,
) -> Result<Scalar, PaymentError> {
	let shared_point = counterparty
		.mul_tweak(secp_ctx, &Scalar::from(*own_key))
		.map_err(|_| PaymentError::KeyDerivation)?;

	let mut hmac = HmacEngine::<sha256::Hash>::new(&shared_point.serialize());
	hmac.input(tag.invoice_number().as_bytes());
	let tweak = Hmac::<sha256::Hash>::from_engine(hmac).to_byte_array();

	Scalar::from_be_bytes(tweak).map_err(|_| PaymentError::KeyDerivation)
}

/// Derives the one-time payment public key a sender pays to.
pub fn derive_payment_pubkey<C: Verification>(
	secp_ctx: &Secp256k1<C>, sender_root_key: &SecretKey, recipient: &IdentityKey,
	tag: &DerivationTag,
) -> Result<PublicKey, PaymentError> {
	let tweak = invoice_tweak(secp_ctx, sender_root_key, recipient.public_key(), tag)?;
	recipient.public_key().add_exp_tweak(secp_ctx, &tweak).map_err(|_| PaymentError::KeyDerivation)
}

/// Derives the private key a recipient spends a BRC-29 payment with. Its public key is the one
/// [`derive_payment_pubkey`] computes on the sender's side for the same tag.
pub fn derive_spending_key<C: Verification>(
	secp_ctx: &Secp256k1<C>, recipient_root_key: &SecretKey, sender: &IdentityKey,
	tag: &DerivationTag,
) -> Result<SecretKey, PaymentError> {
	let tweak = invoice_tweak(secp_ctx, recipient_root_key, sender.public_key(), tag)?;
	recipient_root_key.add_tweak(&tweak).map_err(|_| PaymentError::KeyDerivation)
}

/// The pay-to-pubkey-hash script locking an output to `payment_key`.
pub fn payment_script(payment_key: &PublicKey) -> ScriptBuf {
	ScriptBuf::new_p2pkh(&PubkeyHash::hash(&payment_key.serialize()))
}

/// Derives the one-time locking script for a payment to `recipient`.
///
/// `recipient` must be the recipient's identity key in hex. Anything else, in particular a base58
/// address, is rejected with [`PaymentError::InvalidRecipientFormat`] as the derivation needs the
/// full public key.
pub fn derive_locking_script<C: Verification>(
	secp_ctx: &Secp256k1<C>, sender_root_key: &SecretKey, recipient: &str, tag: &DerivationTag,
) -> Result<ScriptBuf, PaymentError> {
	let recipient = IdentityKey::from_str(recipient)
		.map_err(|_| PaymentError::InvalidRecipientFormat { value: recipient.to_owned() })?;
	let payment_key = derive_payment_pubkey(secp_ctx, sender_root_key, &recipient, tag)?;
	Ok(payment_script(&payment_key))
}
