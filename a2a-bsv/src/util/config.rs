// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Various user-configurable payment settings which the builder, acceptor and import path apply
//! for you.

/// Configuration shared by [`PaymentBuilder`], [`PaymentAcceptor`] and
/// [`import_external_output`].
///
/// `Default::default()` provides sane defaults matching what other BRC-29 agent wallets send and
/// expect.
///
/// [`PaymentBuilder`]: crate::payment::builder::PaymentBuilder
/// [`PaymentAcceptor`]: crate::payment::accept::PaymentAcceptor
/// [`import_external_output`]: crate::chain::import::import_external_output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentConfig {
	/// Description used for outgoing payments when the caller does not provide one.
	///
	/// Descriptions are always normalized into the 5 to 50 character range before they reach the
	/// wallet, so this value is subject to the same normalization.
	///
	/// Default value: "agent payment".
	pub default_payment_description: String,
	/// Description used when internalizing a received payment without a caller-provided one.
	///
	/// Default value: "received payment".
	pub default_accept_description: String,
	/// Action label attached to every funding transaction we ask the wallet to create, allowing
	/// agent payments to be listed separately from other wallet activity.
	///
	/// Default value: "a2a-payment".
	pub payment_label: String,
	/// Output tag attached to the payment output. Wallets use `relinquish` to mark an output
	/// which leaves the wallet's control once the transaction is created.
	///
	/// Default value: "relinquish".
	pub output_tag: String,
	/// Description used when internalizing an output imported from a block explorer.
	///
	/// Default value: "External funding import".
	pub import_description: String,
	/// Confirmations an externally funded transaction must have before we fetch its merkle proof
	/// and import it. Unconfirmed transactions have no proof to translate, so values below 1 are
	/// treated as 1.
	///
	/// Default value: 1.
	pub min_import_confirmations: u32,
}

impl Default for PaymentConfig {
	fn default() -> PaymentConfig {
		PaymentConfig {
			default_payment_description: "agent payment".to_owned(),
			default_accept_description: "received payment".to_owned(),
			payment_label: "a2a-payment".to_owned(),
			output_tag: "relinquish".to_owned(),
			import_description: "External funding import".to_owned(),
			min_import_confirmations: 1,
		}
	}
}
