// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Identity keys are a wallet's long-lived compressed public keys. BRC-29 payments are addressed
//! to them directly instead of to a hashed address.

use bitcoin::hashes::Hash;
use bitcoin::hex::{DisplayHex, FromHex};
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey, Signing};
use bitcoin::{Address, Network, PubkeyHash};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use core::fmt;
use core::str::FromStr;

/// Length of a hex-encoded compressed public key.
pub const IDENTITY_KEY_HEX_LEN: usize = 66;

/// Returns whether `s` has the textual form of a compressed public key: 66 hex characters (of
/// either case) starting with `02` or `03`.
///
/// This only checks the format. [`IdentityKey::from_str`] additionally checks the key is a point
/// on the curve.
pub fn is_identity_key_format(s: &str) -> bool {
	s.len() == IDENTITY_KEY_HEX_LEN
		&& (s.starts_with("02") || s.starts_with("03"))
		&& s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Why a string was not accepted as an [`IdentityKey`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IdentityKeyError {
	/// The string is not 66 hex characters starting with `02` or `03`.
	InvalidFormat,
	/// The string has the right format but does not encode a point on the curve.
	InvalidPoint,
}

impl fmt::Display for IdentityKeyError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Self::InvalidFormat => {
				write!(f, "expected 66 hex characters starting with 02 or 03")
			},
			Self::InvalidPoint => write!(f, "not a valid secp256k1 point"),
		}
	}
}

impl std::error::Error for IdentityKeyError {}

/// A wallet's identity key.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(PublicKey);

impl IdentityKey {
	/// Wraps an existing public key.
	pub fn from_public_key(pubkey: PublicKey) -> Self {
		IdentityKey(pubkey)
	}

	/// Derives the identity key of the wallet owning `root_key`.
	pub fn from_root_key<C: Signing>(secp_ctx: &Secp256k1<C>, root_key: &SecretKey) -> Self {
		IdentityKey(PublicKey::from_secret_key(secp_ctx, root_key))
	}

	/// The underlying public key.
	pub fn public_key(&self) -> &PublicKey {
		&self.0
	}

	/// The 33-byte compressed serialization.
	pub fn serialize(&self) -> [u8; 33] {
		self.0.serialize()
	}

	/// HASH160 of the compressed serialization.
	pub fn pubkey_hash(&self) -> PubkeyHash {
		PubkeyHash::hash(&self.0.serialize())
	}

	/// The legacy pay-to-pubkey-hash address of this key, used to receive funding from wallets
	/// which cannot pay an identity key directly.
	///
	/// Mainnet addresses use version byte `0x00`, all test networks `0x6f`.
	pub fn p2pkh_address(&self, network: Network) -> Address {
		Address::p2pkh(self.pubkey_hash(), network)
	}
}

impl FromStr for IdentityKey {
	type Err = IdentityKeyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if !is_identity_key_format(s) {
			return Err(IdentityKeyError::InvalidFormat);
		}
		let bytes = <[u8; 33]>::from_hex(s).map_err(|_| IdentityKeyError::InvalidFormat)?;
		PublicKey::from_slice(&bytes).map(IdentityKey).map_err(|_| IdentityKeyError::InvalidPoint)
	}
}

impl fmt::Display for IdentityKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0.serialize().as_hex())
	}
}

impl fmt::Debug for IdentityKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "IdentityKey({})", self)
	}
}

impl Serialize for IdentityKey {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for IdentityKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		IdentityKey::from_str(&s).map_err(D::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn key_one() -> SecretKey {
		let mut bytes = [0; 32];
		bytes[31] = 1;
		SecretKey::from_slice(&bytes).unwrap()
	}

	const G_COMPRESSED: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

	#[test]
	fn format_check() {
		assert!(is_identity_key_format(G_COMPRESSED));
		assert!(is_identity_key_format(&G_COMPRESSED.to_uppercase()));
		assert!(!is_identity_key_format("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
		assert!(!is_identity_key_format(""));
		// Uncompressed prefix
		assert!(!is_identity_key_format(&format!("04{}", &G_COMPRESSED[2..])));
		// One character short
		assert!(!is_identity_key_format(&G_COMPRESSED[..65]));
		assert!(!is_identity_key_format(&format!("02{}", "g".repeat(64))));
	}

	#[test]
	fn parse_and_display() {
		let key = IdentityKey::from_str(&G_COMPRESSED.to_uppercase()).unwrap();
		assert_eq!(key.to_string(), G_COMPRESSED);
		assert_eq!(key, IdentityKey::from_root_key(&Secp256k1::new(), &key_one()));

		assert_eq!(IdentityKey::from_str("not-a-pubkey"), Err(IdentityKeyError::InvalidFormat));
		// x beyond the field size
		let off_curve = format!("02{}", "f".repeat(64));
		assert_eq!(IdentityKey::from_str(&off_curve), Err(IdentityKeyError::InvalidPoint));
	}

	#[test]
	fn p2pkh_address() {
		let key = IdentityKey::from_root_key(&Secp256k1::new(), &key_one());
		assert_eq!(
			key.p2pkh_address(Network::Bitcoin).to_string(),
			"1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
		);
		let testnet = key.p2pkh_address(Network::Testnet).to_string();
		assert!(testnet.starts_with('m') || testnet.starts_with('n'));
	}

	#[test]
	fn serde_as_hex_string() {
		let key = IdentityKey::from_str(G_COMPRESSED).unwrap();
		let json = serde_json::to_string(&key).unwrap();
		assert_eq!(json, format!("\"{}\"", G_COMPRESSED));
		let back: IdentityKey = serde_json::from_str(&json).unwrap();
		assert_eq!(back, key);
		let address = "\"1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa\"";
		assert!(serde_json::from_str::<IdentityKey>(address).is_err());
	}
}
