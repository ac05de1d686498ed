// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Claiming received BRC-29 payments into the wallet.

use crate::envelope::{self, from_transport_string};
use crate::identity::IdentityKey;
use crate::payment::{normalize_description, AcceptResult};
use crate::sign::brc29::DerivationTag;
use crate::util::config::PaymentConfig;
use crate::util::errors::PaymentError;
use crate::util::logger::{Logger, WithContext};
use crate::wallet::{
	InternalizeOutput, InternalizeRequest, PaymentRemittance, WalletInterface,
	WALLET_PAYMENT_PROTOCOL,
};

use core::ops::Deref;
use core::str::FromStr;

/// Hands received payments to the wallet, which verifies them and takes ownership of the paid
/// output.
pub struct PaymentAcceptor<W: Deref, L: Deref>
where
	W::Target: WalletInterface,
	L::Target: Logger,
{
	wallet: W,
	logger: L,
	config: PaymentConfig,
}

impl<W: Deref, L: Deref> PaymentAcceptor<W, L>
where
	W::Target: WalletInterface,
	L::Target: Logger,
{
	/// Creates an acceptor claiming into `wallet`.
	pub fn new(wallet: W, logger: L, config: PaymentConfig) -> Self {
		PaymentAcceptor { wallet, logger, config }
	}

	/// Claims output `output_index` of the envelope's terminal transaction, paid by
	/// `sender_identity_key` under `tag`.
	///
	/// The envelope is only decoded here to reject garbage early, the wallet performs the SPV
	/// verification. A rejection by the wallet is returned as [`PaymentError::Wallet`] with the
	/// wallet's message unchanged, and `accepted` is only `true` if the wallet said so.
	///
	/// `description` defaults to [`PaymentConfig::default_accept_description`].
	pub fn accept(
		&self, envelope: &str, output_index: u32, tag: &DerivationTag, sender_identity_key: &str,
		description: Option<&str>,
	) -> Result<AcceptResult, PaymentError> {
		let sender = IdentityKey::from_str(sender_identity_key).map_err(|_| {
			PaymentError::InvalidSenderFormat { value: sender_identity_key.to_owned() }
		})?;

		let tx = from_transport_string(envelope)?;
		let bundle = envelope::decode(&tx)?;
		let logger = WithContext::from(&self.logger, Some(bundle.terminal_txid));
		let output_count = bundle.output_count();
		if output_index as usize >= output_count {
			log_error!(
				logger,
				"Cannot claim output {} of {} from {}",
				output_index,
				output_count,
				sender
			);
			return Err(PaymentError::InvalidOutputIndex { index: output_index, output_count });
		}

		let request = InternalizeRequest {
			tx,
			outputs: vec![InternalizeOutput {
				output_index,
				protocol: WALLET_PAYMENT_PROTOCOL.to_owned(),
				payment_remittance: PaymentRemittance {
					derivation_prefix: tag.prefix.clone(),
					derivation_suffix: tag.suffix.clone(),
					sender_identity_key: sender,
				},
			}],
			description: normalize_description(
				description.unwrap_or(self.config.default_accept_description.as_str()),
			),
		};
		log_debug!(logger, "Internalizing output {} paid by {}", output_index, sender);

		match self.wallet.internalize_payment(request) {
			Ok(outcome) => {
				if outcome.accepted {
					log_info!(logger, "Accepted payment output {} from {}", output_index, sender);
				} else {
					log_warn!(
						logger,
						"Wallet declined payment output {} from {}",
						output_index,
						sender
					);
				}
				Ok(AcceptResult { accepted: outcome.accepted })
			},
			Err(e) => {
				log_error!(logger, "Wallet rejected payment output {}: {}", output_index, e);
				Err(PaymentError::Wallet(e))
			},
		}
	}
}
