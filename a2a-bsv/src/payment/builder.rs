// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Building outgoing BRC-29 payments.

use bitcoin::secp256k1::{self, Secp256k1, SecretKey};

use serde_json::json;

use crate::envelope::{self, encode_atomic, to_transport_string};
use crate::identity::IdentityKey;
use crate::payment::{normalize_description, PaymentResult};
use crate::sign::brc29::{derive_locking_script, DerivationTag};
use crate::sign::EntropySource;
use crate::util::config::PaymentConfig;
use crate::util::errors::PaymentError;
use crate::util::logger::{Logger, WithContext};
use crate::wallet::{FundingOutputRequest, WalletInterface};

use core::ops::Deref;

/// Creates payments to other agents' identity keys, funded by our wallet.
pub struct PaymentBuilder<W: Deref, ES: Deref, L: Deref>
where
	W::Target: WalletInterface,
	ES::Target: EntropySource,
	L::Target: Logger,
{
	wallet: W,
	entropy_source: ES,
	logger: L,
	root_key: SecretKey,
	identity_key: IdentityKey,
	secp_ctx: Secp256k1<secp256k1::All>,
	config: PaymentConfig,
}

impl<W: Deref, ES: Deref, L: Deref> PaymentBuilder<W, ES, L>
where
	W::Target: WalletInterface,
	ES::Target: EntropySource,
	L::Target: Logger,
{
	/// Creates a builder paying from the wallet whose root key is `root_key`.
	pub fn new(
		wallet: W, entropy_source: ES, logger: L, root_key: SecretKey, config: PaymentConfig,
	) -> Self {
		let secp_ctx = Secp256k1::new();
		let identity_key = IdentityKey::from_root_key(&secp_ctx, &root_key);
		PaymentBuilder { wallet, entropy_source, logger, root_key, identity_key, secp_ctx, config }
	}

	/// Our identity key, which recipients need to claim our payments.
	pub fn identity_key(&self) -> IdentityKey {
		self.identity_key
	}

	/// Pays `satoshis` to the agent with identity key `recipient`.
	///
	/// A fresh [`DerivationTag`] is generated on every call, so retrying after a failure never
	/// reuses a payment key. The wallet is asked for an immediately broadcast transaction with
	/// outputs in request order, and the transaction it returns is repackaged as an Atomic BEEF.
	///
	/// `description` defaults to [`PaymentConfig::default_payment_description`] and is
	/// normalized with [`normalize_description`].
	pub fn build(
		&self, recipient: &str, satoshis: u64, description: Option<&str>,
	) -> Result<PaymentResult, PaymentError> {
		if satoshis == 0 {
			return Err(PaymentError::InvalidAmount { satoshis });
		}

		let tag = DerivationTag::generate(&self.entropy_source);
		let locking_script = derive_locking_script(&self.secp_ctx, &self.root_key, recipient, &tag)
			.map_err(|e| {
				log_error!(self.logger, "Refusing to pay {}: {}", recipient, e);
				e
			})?;
		log_debug!(
			self.logger,
			"Derived payment script {} for invoice {}",
			log_script!(locking_script),
			tag.invoice_number()
		);

		let description = normalize_description(
			description.unwrap_or(self.config.default_payment_description.as_str()),
		);
		let custom_instructions = json!({
			"derivationPrefix": tag.prefix,
			"derivationSuffix": tag.suffix,
			"type": "BRC29",
		})
		.to_string();
		let request = FundingOutputRequest {
			locking_script: locking_script.clone(),
			satoshis,
			output_description: description.clone(),
			description,
			labels: vec![self.config.payment_label.clone()],
			tags: vec![self.config.output_tag.clone()],
			custom_instructions,
			randomize_outputs: false,
			accept_delayed_broadcast: false,
		};

		let funding = match self.wallet.create_funding_output(request) {
			Ok(Some(funding)) if !funding.is_empty() => funding,
			Ok(_) => {
				log_error!(
					self.logger,
					"Wallet returned no transaction for a {} sat payment",
					satoshis
				);
				return Err(PaymentError::FundingFailed {
					reason: "wallet returned no transaction".to_owned(),
				});
			},
			Err(e) => {
				log_error!(self.logger, "Wallet failed to fund a {} sat payment: {}", satoshis, e);
				return Err(PaymentError::Wallet(e));
			},
		};
		log_trace!(self.logger, "Wallet returned funding BEEF {}", log_bytes!(funding));

		let bundle = envelope::decode(&funding)?;
		let txid = bundle.terminal_txid;
		let logger = WithContext::from(&self.logger, Some(txid));
		let pays_script = bundle.terminal_transaction().map_or(false, |tx| {
			tx.output
				.iter()
				.any(|o| o.script_pubkey == locking_script && o.value.to_sat() == satoshis)
		});
		if !pays_script {
			log_error!(
				logger,
				"Funding transaction does not pay {} sats to the derived script",
				satoshis
			);
			return Err(PaymentError::FundingFailed {
				reason: format!(
					"funding transaction {} does not pay {} satoshis to the payment script",
					txid, satoshis
				),
			});
		}

		let atomic = encode_atomic(&bundle.transactions, &txid)?;
		log_info!(
			logger,
			"Created payment of {} sats to {} in {} ancestry transactions",
			satoshis,
			recipient,
			bundle.transactions.len()
		);

		Ok(PaymentResult {
			envelope: to_transport_string(&atomic),
			txid,
			satoshis,
			derivation_prefix: tag.prefix,
			derivation_suffix: tag.suffix,
			sender_identity_key: self.identity_key,
		})
	}
}
