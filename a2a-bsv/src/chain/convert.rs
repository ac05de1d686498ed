// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Conversions from block explorer JSON responses, for [`BlockExplorer`] implementations.
//!
//! [`BlockExplorer`]: crate::chain::BlockExplorer

use bitcoin::consensus::encode;
use bitcoin::hex::FromHex;
use bitcoin::Transaction;

use crate::chain::tsc::TscProof;
use crate::chain::TransactionStatus;

/// A block explorer response body in JSON format.
pub struct JsonResponse(pub serde_json::Value);

impl From<serde_json::Value> for JsonResponse {
	fn from(value: serde_json::Value) -> Self {
		JsonResponse(value)
	}
}

/// Interprets bytes from a response body as a JSON value.
impl TryFrom<Vec<u8>> for JsonResponse {
	type Error = std::io::Error;

	fn try_from(bytes: Vec<u8>) -> std::io::Result<Self> {
		Ok(JsonResponse(serde_json::from_slice(&bytes)?))
	}
}

/// Converts a JSON value into a transaction status. Unconfirmed transactions may omit both
/// fields.
impl TryInto<TransactionStatus> for JsonResponse {
	type Error = std::io::Error;

	fn try_into(self) -> std::io::Result<TransactionStatus> {
		if !self.0.is_object() {
			return Err(std::io::Error::new(
				std::io::ErrorKind::InvalidData,
				"expected JSON object",
			));
		}
		serde_json::from_value(self.0).map_err(|_| {
			std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid transaction status")
		})
	}
}

/// Converts a JSON value into TSC proofs. The value may be a single proof object or an array of
/// them; `null` and an empty array mean the explorer has no proof yet.
impl TryInto<Vec<TscProof>> for JsonResponse {
	type Error = std::io::Error;

	fn try_into(self) -> std::io::Result<Vec<TscProof>> {
		let proofs = match self.0 {
			serde_json::Value::Null => return Ok(Vec::new()),
			serde_json::Value::Array(array) => array,
			serde_json::Value::Object(_) => vec![self.0],
			_ => {
				return Err(std::io::Error::new(
					std::io::ErrorKind::InvalidData,
					"unexpected JSON type",
				))
			},
		};
		proofs
			.into_iter()
			.map(|proof| {
				serde_json::from_value(proof).map_err(|_| {
					std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid TSC proof")
				})
			})
			.collect()
	}
}

/// Converts a JSON value into a transaction. Assumes the transaction is hex-encoded in a JSON
/// string.
impl TryInto<Transaction> for JsonResponse {
	type Error = std::io::Error;

	fn try_into(self) -> std::io::Result<Transaction> {
		match self.0.as_str() {
			None => {
				Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected JSON string"))
			},
			Some(hex_data) => match Vec::<u8>::from_hex(hex_data.trim()) {
				Err(_) => {
					Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid hex data"))
				},
				Ok(tx_data) => match encode::deserialize(&tx_data) {
					Err(_) => Err(std::io::Error::new(
						std::io::ErrorKind::InvalidData,
						"invalid transaction",
					)),
					Ok(tx) => Ok(tx),
				},
			},
		}
	}
}
