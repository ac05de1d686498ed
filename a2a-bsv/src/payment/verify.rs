// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Structural pre-checks of a received payment envelope.

use crate::envelope::Envelope;
use crate::identity::is_identity_key_format;
use crate::payment::VerificationResult;

/// Checks a received envelope before it is handed to the wallet.
///
/// All checks run and every failure is reported: the envelope must decode, and if given,
/// `expected_sender` must have the identity key format and some output of the terminal
/// transaction must pay exactly `expected_amount`. An empty `expected_sender` counts as not given.
///
/// Merkle proofs are not checked here, the wallet does that when accepting the payment.
pub fn verify(
	envelope: &str, expected_amount: Option<u64>, expected_sender: Option<&str>,
) -> VerificationResult {
	let mut errors = Vec::new();
	let mut txid = None;
	let mut output_count = 0;

	match Envelope::from_transport_string(envelope) {
		Ok(envelope) => {
			txid = Some(envelope.terminal_txid);
			output_count = envelope.output_count();
			if let (Some(amount), Some(tx)) = (expected_amount, envelope.terminal_transaction()) {
				if !tx.output.iter().any(|output| output.value.to_sat() == amount) {
					errors.push(format!("no output pays the expected {} satoshis", amount));
				}
			}
		},
		Err(e) => errors.push(format!("BEEF parse error: {}", e)),
	}

	if let Some(sender) = expected_sender.filter(|s| !s.is_empty()) {
		if !is_identity_key_format(sender) {
			errors.push(format!(
				"expectedSender is not a valid compressed public key: {:?}",
				sender
			));
		}
	}

	VerificationResult { valid: errors.is_empty(), txid, output_count, errors }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::envelope::{encode_atomic, to_transport_string, BundledTransaction};
	use crate::util::test_utils::{mined_parent, spend};

	fn single_transaction_envelope() -> (String, bitcoin::Txid) {
		let (tx, path) = mined_parent(4, 5_000);
		let txid = tx.compute_txid();
		let bytes = encode_atomic(&[BundledTransaction::mined(tx, path)], &txid).unwrap();
		(to_transport_string(&bytes), txid)
	}

	const SENDER: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

	#[test]
	fn empty_input() {
		let result = verify("", None, None);
		assert!(!result.valid);
		assert_eq!(result.txid, None);
		assert_eq!(result.output_count, 0);
		assert_eq!(result.errors.len(), 1);
		assert!(result.errors[0].contains("parse error"));
	}

	#[test]
	fn well_formed_envelope() {
		let (envelope, txid) = single_transaction_envelope();
		let result = verify(&envelope, None, Some(SENDER));
		assert_eq!(
			result,
			VerificationResult { valid: true, txid: Some(txid), output_count: 1, errors: vec![] }
		);

		let (parent, path) = mined_parent(5, 9_000);
		let child = spend(&[(parent.compute_txid(), 0)], &[1_000, 2_000, 5_000]);
		let bytes = encode_atomic(
			&[BundledTransaction::mined(parent, path), BundledTransaction::unmined(child.clone())],
			&child.compute_txid(),
		)
		.unwrap();
		let result = verify(&to_transport_string(&bytes), Some(2_000), None);
		assert!(result.valid);
		assert_eq!(result.output_count, 3);
		assert_eq!(result.txid, Some(child.compute_txid()));
	}

	#[test]
	fn bad_sender_is_always_reported() {
		let (envelope, _) = single_transaction_envelope();
		let result = verify(&envelope, None, Some("not-a-pubkey"));
		assert!(!result.valid);
		assert_eq!(result.errors.len(), 1);
		assert!(result.errors[0].contains("expectedSender"));
		// The envelope itself still decoded
		assert_eq!(result.output_count, 1);

		let result = verify("!!!", None, Some("not-a-pubkey"));
		assert!(!result.valid);
		assert!(result.errors.len() >= 2);
		assert!(result.errors[0].contains("parse error"));
		assert!(result.errors[1].contains("expectedSender"));

		assert!(verify(&envelope, None, Some("")).valid);
	}

	#[test]
	fn sender_check_is_format_only() {
		let (envelope, _) = single_transaction_envelope();
		// Not a point on the curve, but shaped like a compressed key
		let off_curve = format!("02{}", "00".repeat(32));
		assert!(verify(&envelope, None, Some(&off_curve)).valid);
		assert!(verify(&envelope, None, Some(&SENDER.to_uppercase())).valid);
		assert!(!verify(&envelope, None, Some(&format!("04{}", "00".repeat(32)))).valid);
		assert!(!verify(&envelope, None, Some(&SENDER[..64])).valid);
	}

	#[test]
	fn amount_mismatch() {
		let (envelope, _) = single_transaction_envelope();
		let result = verify(&envelope, Some(4_999), None);
		assert!(!result.valid);
		assert_eq!(result.errors, vec!["no output pays the expected 4999 satoshis".to_owned()]);
		assert!(verify(&envelope, Some(5_000), None).valid);
	}

	#[test]
	fn verification_is_idempotent() {
		let (envelope, _) = single_transaction_envelope();
		for input in [envelope.as_str(), "", "AQEBAQ=="] {
			assert_eq!(verify(input, Some(1), Some("x")), verify(input, Some(1), Some("x")));
		}
	}
}
