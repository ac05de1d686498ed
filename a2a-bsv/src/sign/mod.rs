// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Provides keys and randomness to the payment builder.
//!
//! [`brc29`] holds the BRC-29 payment key derivation shared by senders and recipients.

use bitcoin::secp256k1::rand::{thread_rng, RngCore};

pub mod brc29;

/// A trait that describes a source of entropy.
pub trait EntropySource {
	/// Gets a unique, cryptographically-secure, random 32-byte value. This method must return a
	/// different value each time it is called.
	fn get_secure_random_bytes(&self) -> [u8; 32];
}

/// An [`EntropySource`] drawing from the operating system's random number generator through the
/// thread-local RNG bundled with secp256k1.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsEntropySource;

impl EntropySource for OsEntropySource {
	fn get_secure_random_bytes(&self) -> [u8; 32] {
		let mut bytes = [0; 32];
		thread_rng().fill_bytes(&mut bytes);
		bytes
	}
}
