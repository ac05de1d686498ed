// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Agent-to-agent payments on BSV using BRC-29 key derivation.
//!
//! A paying agent derives a one-time payment key from its own root key and the recipient's
//! identity key (see [`sign::brc29`]), has its wallet fund an output to that key, and hands the
//! recipient the funding transaction and its unconfirmed ancestry as an Atomic BEEF envelope
//! ([`envelope`]) together with the derivation data. The recipient checks the envelope with
//! [`payment::verify::verify`] and claims the output through its wallet with
//! [`payment::accept::PaymentAcceptor`].
//!
//! Wallets are reached through the [`wallet::WalletInterface`] trait and do the signing,
//! broadcasting and SPV verification themselves; nothing here holds persistent state. Outputs
//! funded by ordinary transactions can be brought into a wallet with
//! [`chain::import::import_external_output`], which turns a block explorer's TSC merkle proof
//! into an envelope.

#![cfg_attr(not(test), deny(missing_docs))]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![forbid(unsafe_code)]

extern crate bitcoin;

#[macro_use]
pub mod util;
pub mod chain;
pub mod envelope;
pub mod identity;
pub mod payment;
pub mod sign;
pub mod wallet;
