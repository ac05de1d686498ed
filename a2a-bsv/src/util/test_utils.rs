// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{
	Amount, OutPoint, PubkeyHash, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};

use crate::envelope::merkle_path::{MerklePath, PathElement};
use crate::envelope::{encode_atomic, BundledTransaction};
use crate::sign::EntropySource;
use crate::util::logger::{Level, Logger, Record};
use crate::wallet::{
	FundingOutputRequest, InternalizeOutcome, InternalizeRequest, WalletError, WalletInterface,
};

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::collections::HashMap;
use std::sync::Mutex;

pub struct TestLogger {
	level: Level,
	id: String,
	pub lines: Mutex<HashMap<(String, String), usize>>,
	pub context: Mutex<HashMap<(String, Option<Txid>), usize>>,
}

impl TestLogger {
	pub fn new() -> TestLogger {
		Self::with_id("".to_owned())
	}
	pub fn with_id(id: String) -> TestLogger {
		TestLogger {
			level: Level::Trace,
			id,
			lines: Mutex::new(HashMap::new()),
			context: Mutex::new(HashMap::new()),
		}
	}

	/// Search for the number of occurrence of the logged lines which
	/// 1. belongs to the specified module and
	/// 2. contains `line` in it.
	/// And asserts if the number of occurrences is the same with the given `count`
	pub fn assert_log_contains(&self, module: &str, line: &str, count: usize) {
		let log_entries = self.lines.lock().unwrap();
		let l: usize = log_entries
			.iter()
			.filter(|&(&(ref m, ref l), _c)| m == module && l.contains(line))
			.map(|(_, c)| c)
			.sum();
		assert_eq!(l, count)
	}

	/// Search for the number of occurrences of logged lines which
	/// 1. belong to the specified module and
	/// 2. carry the given transaction id.
	/// Assert that the number of occurrences equals the given `count`
	pub fn assert_log_context_contains(&self, module: &str, txid: Option<Txid>, count: usize) {
		let context_entries = self.context.lock().unwrap();
		let l = context_entries.get(&(module.to_owned(), txid)).copied().unwrap_or(0);
		assert_eq!(l, count)
	}
}

impl Logger for TestLogger {
	fn log(&self, record: Record) {
		let context = (record.module_path.to_owned(), record.txid);
		*self.context.lock().unwrap().entry(context).or_insert(0) += 1;
		let line = (record.module_path.to_owned(), format!("{}", record.args));
		*self.lines.lock().unwrap().entry(line).or_insert(0) += 1;
		if record.level >= self.level {
			println!("{} [{}] {}", self.id, record.file, record);
		}
	}
}

/// Returns `[n; 32]` for increasing `n`, so consecutive calls never repeat.
pub struct TestEntropy {
	next: Mutex<u8>,
}

impl TestEntropy {
	pub fn new() -> TestEntropy {
		TestEntropy { next: Mutex::new(1) }
	}
}

impl EntropySource for TestEntropy {
	fn get_secure_random_bytes(&self) -> [u8; 32] {
		let mut next = self.next.lock().unwrap();
		let bytes = [*next; 32];
		*next = next.wrapping_add(1);
		bytes
	}
}

fn dummy_script(seed: u8) -> ScriptBuf {
	ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array([seed; 20]))
}

/// A transaction spending `inputs`, with one dummy output per entry of `values`.
pub fn spend(inputs: &[(Txid, u32)], values: &[u64]) -> Transaction {
	Transaction {
		version: Version::ONE,
		lock_time: LockTime::ZERO,
		input: inputs
			.iter()
			.map(|&(txid, vout)| TxIn {
				previous_output: OutPoint { txid, vout },
				script_sig: ScriptBuf::new(),
				sequence: Sequence::MAX,
				witness: Witness::new(),
			})
			.collect(),
		output: values
			.iter()
			.enumerate()
			.map(|(i, &value)| TxOut {
				value: Amount::from_sat(value),
				script_pubkey: dummy_script(i as u8),
			})
			.collect(),
	}
}

/// A confirmed transaction, alone in block `n`, with a single output of `value`.
pub fn mined_parent(n: u8, value: u64) -> (Transaction, MerklePath) {
	let tx = spend(&[(Txid::from_byte_array([n; 32]), 0)], &[value]);
	let txid = tx.compute_txid();
	let path = MerklePath::new(n as u32, vec![vec![PathElement::leaf(0, Some(txid))]]).unwrap();
	(tx, path)
}

/// Value of the confirmed output each funding transaction of [`TestWallet`] spends.
pub const TEST_WALLET_UTXO_VALUE: u64 = 1_000_000;

/// A wallet funding every request from a fresh confirmed parent and recording what it was asked.
pub struct TestWallet {
	pub funding_requests: Mutex<Vec<FundingOutputRequest>>,
	/// If set, returned by every funding call instead of a freshly built transaction.
	pub funding_response: Mutex<Option<Result<Option<Vec<u8>>, WalletError>>>,
	/// Makes funding transactions pay some other script than the requested one.
	pub pay_wrong_script: AtomicBool,
	pub internalize_requests: Mutex<Vec<InternalizeRequest>>,
	pub internalize_response: Mutex<Result<InternalizeOutcome, WalletError>>,
	next_parent: AtomicU8,
}

impl TestWallet {
	pub fn new() -> TestWallet {
		TestWallet {
			funding_requests: Mutex::new(Vec::new()),
			funding_response: Mutex::new(None),
			pay_wrong_script: AtomicBool::new(false),
			internalize_requests: Mutex::new(Vec::new()),
			internalize_response: Mutex::new(Ok(InternalizeOutcome { accepted: true })),
			next_parent: AtomicU8::new(100),
		}
	}
}

impl WalletInterface for TestWallet {
	fn create_funding_output(
		&self, request: FundingOutputRequest,
	) -> Result<Option<Vec<u8>>, WalletError> {
		self.funding_requests.lock().unwrap().push(request.clone());
		if let Some(response) = self.funding_response.lock().unwrap().clone() {
			return response;
		}

		let (parent, parent_path) =
			mined_parent(self.next_parent.fetch_add(1, Ordering::AcqRel), TEST_WALLET_UTXO_VALUE);
		let mut child = spend(
			&[(parent.compute_txid(), 0)],
			&[request.satoshis, TEST_WALLET_UTXO_VALUE - request.satoshis - 500],
		);
		if !self.pay_wrong_script.load(Ordering::Acquire) {
			child.output[0].script_pubkey = request.locking_script;
		}
		let txid = child.compute_txid();
		let bundle =
			[BundledTransaction::mined(parent, parent_path), BundledTransaction::unmined(child)];
		encode_atomic(&bundle, &txid).map(Some).map_err(|e| WalletError::new(e.to_string()))
	}

	fn internalize_payment(
		&self, request: InternalizeRequest,
	) -> Result<InternalizeOutcome, WalletError> {
		self.internalize_requests.lock().unwrap().push(request);
		self.internalize_response.lock().unwrap().clone()
	}
}
