// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! End-to-end payment between two agents, each with its own wallet, and import of an externally
//! funded output through explorer JSON.

use a2a_bsv::chain::convert::JsonResponse;
use a2a_bsv::chain::import::import_external_output;
use a2a_bsv::chain::tsc::TscProof;
use a2a_bsv::chain::{BlockExplorer, ExplorerError, TransactionStatus};
use a2a_bsv::envelope::merkle_path::{txid_to_node, MerklePath, PathElement};
use a2a_bsv::envelope::{self, encode_atomic, BundledTransaction};
use a2a_bsv::identity::IdentityKey;
use a2a_bsv::payment::accept::PaymentAcceptor;
use a2a_bsv::payment::builder::PaymentBuilder;
use a2a_bsv::payment::verify::verify;
use a2a_bsv::sign::brc29::{derive_spending_key, payment_script, DerivationTag};
use a2a_bsv::sign::OsEntropySource;
use a2a_bsv::util::config::PaymentConfig;
use a2a_bsv::util::logger::{Logger, Record};
use a2a_bsv::wallet::{
	FundingOutputRequest, InternalizeOutcome, InternalizeRequest, WalletError, WalletInterface,
};

use bitcoin::absolute::LockTime;
use bitcoin::consensus::serialize;
use bitcoin::hashes::Hash;
use bitcoin::hex::DisplayHex;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{
	merkle_tree, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxMerkleNode, TxOut,
	Txid, Witness,
};

use serde_json::json;

use std::collections::HashSet;
use std::sync::Mutex;

struct StdoutLogger;

impl Logger for StdoutLogger {
	fn log(&self, record: Record) {
		println!("{}", record);
	}
}

fn transaction(inputs: &[OutPoint], outputs: Vec<TxOut>) -> Transaction {
	Transaction {
		version: Version::ONE,
		lock_time: LockTime::ZERO,
		input: inputs
			.iter()
			.map(|previous_output| TxIn {
				previous_output: *previous_output,
				script_sig: ScriptBuf::new(),
				sequence: Sequence::MAX,
				witness: Witness::new(),
			})
			.collect(),
		output: outputs,
	}
}

fn merkle_root(txids: &[Txid]) -> TxMerkleNode {
	merkle_tree::calculate_root(txids.iter().map(|t| t.to_raw_hash()))
		.map(TxMerkleNode::from_raw_hash)
		.unwrap()
}

/// A wallet with a single confirmed coin, which verifies incoming envelopes against the merkle
/// roots of the blocks it knows and claims outputs by re-deriving their key.
struct SpvWallet {
	root_key: SecretKey,
	coin: (Transaction, MerklePath),
	known_roots: Mutex<HashSet<TxMerkleNode>>,
	claimed: Mutex<Vec<(Txid, u32, u64)>>,
}

impl SpvWallet {
	fn new(seed: u8) -> SpvWallet {
		let root_key = SecretKey::from_slice(&[seed; 32]).unwrap();
		let coin = transaction(
			&[OutPoint { txid: Txid::from_byte_array([seed; 32]), vout: 0 }],
			vec![TxOut { value: Amount::from_sat(100_000), script_pubkey: ScriptBuf::new() }],
		);
		let coin_txid = coin.compute_txid();
		// The coin is the second of two transactions in its block
		let neighbour = Txid::from_byte_array([seed.wrapping_add(1); 32]);
		let path = MerklePath::new(
			800_000 + seed as u32,
			vec![vec![
				PathElement::with_hash(0, txid_to_node(neighbour)),
				PathElement::leaf(1, Some(coin_txid)),
			]],
		)
		.unwrap();
		let mut known_roots = HashSet::new();
		known_roots.insert(merkle_root(&[neighbour, coin_txid]));
		SpvWallet {
			root_key,
			coin: (coin, path),
			known_roots: Mutex::new(known_roots),
			claimed: Mutex::new(Vec::new()),
		}
	}

	fn learn_block(&self, root: TxMerkleNode) {
		self.known_roots.lock().unwrap().insert(root);
	}
}

impl WalletInterface for SpvWallet {
	fn create_funding_output(
		&self, request: FundingOutputRequest,
	) -> Result<Option<Vec<u8>>, WalletError> {
		let (coin, path) = self.coin.clone();
		let available = coin.output[0].value.to_sat();
		if request.satoshis + 200 > available {
			return Err(WalletError::new("Insufficient funds in the available inputs"));
		}
		let change = TxOut {
			value: Amount::from_sat(available - request.satoshis - 200),
			script_pubkey: ScriptBuf::new(),
		};
		let payment = TxOut {
			value: Amount::from_sat(request.satoshis),
			script_pubkey: request.locking_script,
		};
		let funding = OutPoint { txid: coin.compute_txid(), vout: 0 };
		let tx = transaction(&[funding], vec![payment, change]);
		let txid = tx.compute_txid();
		let bundle = [BundledTransaction::mined(coin, path), BundledTransaction::unmined(tx)];
		encode_atomic(&bundle, &txid)
			.map(Some)
			.map_err(|e| WalletError::new(e.to_string()))
	}

	fn internalize_payment(
		&self, request: InternalizeRequest,
	) -> Result<InternalizeOutcome, WalletError> {
		let bundle = envelope::decode(&request.tx).map_err(|e| WalletError::new(e.to_string()))?;
		for bundled in bundle.transactions.iter() {
			if let Some(path) = bundled.merkle_path() {
				let root = path
					.compute_root(&bundled.txid())
					.map_err(|e| WalletError::new(e.to_string()))?;
				if !self.known_roots.lock().unwrap().contains(&root) {
					return Err(WalletError::new(
						"Merkle root does not match any known block header",
					));
				}
			}
		}

		let tx = bundle
			.terminal_transaction()
			.ok_or_else(|| WalletError::new("Missing terminal transaction"))?;
		let secp_ctx = Secp256k1::new();
		for output in request.outputs.iter() {
			let remittance = &output.payment_remittance;
			let paid = tx
				.output
				.get(output.output_index as usize)
				.ok_or_else(|| WalletError::new("Output index out of range"))?;
			if remittance.derivation_prefix != "imported" {
				let tag = DerivationTag::new(
					remittance.derivation_prefix.clone(),
					remittance.derivation_suffix.clone(),
				);
				let key = derive_spending_key(
					&secp_ctx,
					&self.root_key,
					&remittance.sender_identity_key,
					&tag,
				)
				.map_err(|e| WalletError::new(e.to_string()))?;
				let expected = payment_script(&PublicKey::from_secret_key(&secp_ctx, &key));
				if paid.script_pubkey != expected {
					return Err(WalletError::new("Output is not locked to a key we can derive"));
				}
			}
			self.claimed.lock().unwrap().push((
				bundle.terminal_txid,
				output.output_index,
				paid.value.to_sat(),
			));
		}
		Ok(InternalizeOutcome { accepted: true })
	}
}

#[test]
fn agent_pays_agent() {
	let logger = StdoutLogger;
	let alice_wallet = SpvWallet::new(1);
	let bob_wallet = SpvWallet::new(2);
	// Bob knows the block Alice's coin was mined in
	let (alice_coin, alice_path) = alice_wallet.coin.clone();
	bob_wallet.learn_block(alice_path.compute_root(&alice_coin.compute_txid()).unwrap());

	let bob_identity = IdentityKey::from_root_key(&Secp256k1::new(), &bob_wallet.root_key);
	let alice = PaymentBuilder::new(
		&alice_wallet,
		&OsEntropySource,
		&logger,
		alice_wallet.root_key,
		PaymentConfig::default(),
	);
	let payment = alice.build(&bob_identity.to_string(), 12_345, Some("for the report")).unwrap();

	// The payment travels as JSON
	let wire = serde_json::to_string(&payment).unwrap();
	let received: serde_json::Value = serde_json::from_str(&wire).unwrap();
	let envelope = received["beef"].as_str().unwrap();
	let sender = received["senderIdentityKey"].as_str().unwrap();
	let tag = DerivationTag::new(
		received["derivationPrefix"].as_str().unwrap().to_owned(),
		received["derivationSuffix"].as_str().unwrap().to_owned(),
	);

	let verification = verify(envelope, Some(12_345), Some(sender));
	assert!(verification.valid, "{:?}", verification.errors);
	assert_eq!(verification.txid, Some(payment.txid));
	assert_eq!(verification.output_count, 2);

	let bob = PaymentAcceptor::new(&bob_wallet, &logger, PaymentConfig::default());
	let accepted = bob.accept(envelope, 0, &tag, sender, None).unwrap();
	assert!(accepted.accepted);
	assert_eq!(*bob_wallet.claimed.lock().unwrap(), vec![(payment.txid, 0, 12_345)]);

	// Claiming the change output fails, it is not locked to a key Bob can derive
	let err = bob.accept(envelope, 1, &tag, sender, None).unwrap_err();
	assert_eq!(err.to_string(), "Output is not locked to a key we can derive");

	// A wallet which does not know the block refuses the envelope
	let carol_wallet = SpvWallet::new(3);
	let carol = PaymentAcceptor::new(&carol_wallet, &logger, PaymentConfig::default());
	let err = carol.accept(envelope, 0, &tag, sender, None).unwrap_err();
	assert_eq!(err.to_string(), "Merkle root does not match any known block header");
}

#[test]
fn payments_to_addresses_are_refused() {
	let logger = StdoutLogger;
	let wallet = SpvWallet::new(4);
	let config = PaymentConfig::default();
	let builder = PaymentBuilder::new(&wallet, &OsEntropySource, &logger, wallet.root_key, config);
	let recipient =
		IdentityKey::from_root_key(&Secp256k1::new(), &SecretKey::from_slice(&[5; 32]).unwrap());
	let address = recipient.p2pkh_address(bitcoin::Network::Bitcoin).to_string();
	assert!(builder.build(&address, 1_000, None).is_err());

	let err = builder.build(&recipient.to_string(), 1_000_000, None).unwrap_err();
	assert_eq!(err.to_string(), "Insufficient funds in the available inputs");
}

/// Serves canned explorer JSON, as a REST client would receive it.
struct JsonExplorer {
	status: serde_json::Value,
	raw: serde_json::Value,
	proof: serde_json::Value,
}

impl BlockExplorer for JsonExplorer {
	fn transaction_status(&self, _txid: &Txid) -> Result<TransactionStatus, ExplorerError> {
		JsonResponse(self.status.clone()).try_into().map_err(ExplorerError::persistent)
	}

	fn raw_transaction(&self, _txid: &Txid) -> Result<Transaction, ExplorerError> {
		JsonResponse(self.raw.clone()).try_into().map_err(ExplorerError::persistent)
	}

	fn tsc_proofs(&self, _txid: &Txid) -> Result<Vec<TscProof>, ExplorerError> {
		JsonResponse(self.proof.clone()).try_into().map_err(ExplorerError::persistent)
	}
}

#[test]
fn imports_faucet_funding() {
	let logger = StdoutLogger;
	let wallet = SpvWallet::new(6);
	let identity = IdentityKey::from_root_key(&Secp256k1::new(), &wallet.root_key);

	let faucet = transaction(
		&[OutPoint { txid: Txid::from_byte_array([0xfa; 32]), vout: 3 }],
		vec![
			TxOut { value: Amount::from_sat(5_000), script_pubkey: ScriptBuf::new() },
			TxOut {
				value: Amount::from_sat(50_000),
				script_pubkey: identity.p2pkh_address(bitcoin::Network::Bitcoin).script_pubkey(),
			},
		],
	);
	let txid = faucet.compute_txid();
	// Five transactions in the block, the faucet payment at index 4
	let mut block: Vec<Txid> = (10..14u8).map(|n| Txid::from_byte_array([n; 32])).collect();
	block.push(txid);
	let root = merkle_root(&block);
	wallet.learn_block(root);

	let level1 = merkle_root(&block[..4]);
	let explorer = JsonExplorer {
		status: json!({"txid": txid.to_string(), "confirmations": 3, "blockheight": 870_123}),
		raw: json!(serialize(&faucet).to_lower_hex_string()),
		proof: json!([{
			"index": 4,
			"txOrId": txid.to_string(),
			"target": "0000000000000000000000000000000000000000000000000000000000000000",
			"nodes": ["*", "*", level1.to_string()],
		}]),
	};

	let result = import_external_output(
		&&explorer,
		&&wallet,
		&identity,
		&txid,
		1,
		&PaymentConfig::default(),
		&&logger,
	)
	.unwrap();
	assert!(result.accepted);
	assert_eq!(result.satoshis, 50_000);
	assert_eq!(result.block_height, 870_123);
	assert_eq!(*wallet.claimed.lock().unwrap(), vec![(txid, 1, 50_000)]);
}
