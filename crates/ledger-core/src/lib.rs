//! A single-node ledger: blocks linked by SHA-256 hash, sealed with a
//! leading-zero proof of work and verifiable by replaying the hash chain.

pub mod canonical;
pub mod chain;
pub mod constants;
pub mod error;
mod mine;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use chain::{genesis_block, Blockchain, ChainConfig, Rehash};
pub use error::{ChainError, ValidationError};
pub use pow::{MiningReport, MiningStrategy};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: u64) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "sender": self.sender,
            "receiver": self.receiver,
            "amount": self.amount,
        })
    }
}

/// What a block carries. The genesis block holds a bare marker, every other
/// block a list of transfers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Genesis(String),
    Transactions(Vec<Transaction>),
}

impl Payload {
    pub fn genesis() -> Self {
        Payload::Genesis(constants::GENESIS_MARKER.to_string())
    }

    /// Canonical JSON bytes of the payload, the form that goes into the digest.
    pub fn canonical(&self) -> Vec<u8> {
        let value = match self {
            Payload::Genesis(marker) => Value::String(marker.clone()),
            Payload::Transactions(txs) => {
                Value::Array(txs.iter().map(Transaction::to_value).collect())
            }
        };
        canonical::to_canonical_json(&value)
    }
}

impl From<Vec<Transaction>> for Payload {
    fn from(txs: Vec<Transaction>) -> Self {
        Payload::Transactions(txs)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Genesis(marker) => write!(f, "{marker}"),
            Payload::Transactions(txs) => {
                write!(f, "[")?;
                for (i, tx) in txs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} -> {}: {}", tx.sender, tx.receiver, tx.amount)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Render a timestamp the way it is fed to the hasher: shortest round-trip
/// digits, integral values keep a trailing `.0`, and decimal exponents below -4
/// or from 16 up switch to `1.5e+20` / `1e-05` notation. Non-finite values
/// render as `nan`, `inf` and `-inf`.
pub fn format_timestamp(ts: f64) -> String {
    if ts.is_nan() {
        return "nan".to_string();
    }
    if ts.is_infinite() {
        return if ts > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{ts:e}");
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };
    if ts != 0.0 && !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else if ts.fract() == 0.0 {
        format!("{ts:.1}")
    } else {
        format!("{ts}")
    }
}

/// SHA-256 of `prefix` followed by the decimal nonce, as lowercase hex.
pub(crate) fn hash_preimage(prefix: &[u8], nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix);
    hasher.update(nonce.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// One ledger entry. Fields are read-only from outside the crate; the only
/// mutations are mining, linking on append and the chain's tamper hook.
#[derive(Clone, Debug, Serialize)]
pub struct Block {
    index: u64,
    transactions: Payload,
    timestamp: f64,
    previous_hash: String,
    nonce: u64,
    hash: String,
}

impl Block {
    pub fn new(
        index: u64,
        transactions: impl Into<Payload>,
        timestamp: f64,
        previous_hash: impl Into<String>,
    ) -> Self {
        Self::with_nonce(index, transactions, timestamp, previous_hash, 0)
    }

    pub fn with_nonce(
        index: u64,
        transactions: impl Into<Payload>,
        timestamp: f64,
        previous_hash: impl Into<String>,
        nonce: u64,
    ) -> Self {
        let mut block = Self {
            index,
            transactions: transactions.into(),
            timestamp,
            previous_hash: previous_hash.into(),
            nonce,
            hash: String::new(),
        };
        block.hash = block.digest();
        block
    }

    /// Seconds since the Unix epoch, with sub-second precision.
    pub fn now() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn transactions(&self) -> &Payload {
        &self.transactions
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// The stored hash. Not recomputed; compare against [`Block::digest`].
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Every hashed field except the nonce, concatenated in digest order.
    pub(crate) fn preimage_prefix(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(128);
        bytes.extend_from_slice(self.index.to_string().as_bytes());
        bytes.extend_from_slice(self.previous_hash.as_bytes());
        bytes.extend_from_slice(format_timestamp(self.timestamp).as_bytes());
        bytes.extend_from_slice(&self.transactions.canonical());
        bytes
    }

    /// Recompute the digest from the current field values. Does not touch the
    /// stored hash.
    pub fn digest(&self) -> String {
        hash_preimage(&self.preimage_prefix(), self.nonce)
    }

    pub(crate) fn link_to(&mut self, previous_hash: &str) {
        self.previous_hash = previous_hash.to_string();
        self.hash = self.digest();
    }

    pub(crate) fn replace_transactions(&mut self, transactions: Payload) {
        self.transactions = transactions;
    }

    pub(crate) fn rehash(&mut self) {
        self.hash = self.digest();
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block #{}", self.index)?;
        writeln!(f, "Timestamp: {}", format_timestamp(self.timestamp))?;
        writeln!(f, "Transactions: {}", self.transactions)?;
        writeln!(f, "Previous Hash: {}", self.previous_hash)?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        write!(f, "Hash: {}", self.hash)
    }
}

pub mod pow {
    use super::{hash_preimage, mine, Block};
    use crate::constants::HASH_HEX_SIZE;
    use serde::{Deserialize, Serialize};
    use tracing::info;

    /// How the nonce space is searched. Both strategies settle on the same
    /// (lowest) nonce after the starting one.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum MiningStrategy {
        #[default]
        Sequential,
        Parallel,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize)]
    pub struct MiningReport {
        pub index: u64,
        pub nonce: u64,
        pub hash: String,
        /// Nonces tried after the starting one.
        pub attempts: u64,
    }

    /// True when the first `difficulty` hex characters of `hash` are all `'0'`.
    /// Difficulties longer than a digest are never met.
    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        let wanted = difficulty as usize;
        if wanted > HASH_HEX_SIZE || hash.len() < wanted {
            return false;
        }
        hash.bytes().take(wanted).all(|b| b == b'0')
    }

    impl Block {
        /// Increment the nonce until the hash meets `difficulty`. A block whose
        /// current hash already qualifies is left as is.
        ///
        /// Blocks the calling thread until a nonce is found; for a difficulty
        /// above 64 that never happens.
        pub fn mine(&mut self, difficulty: u32) -> MiningReport {
            self.mine_with(difficulty, MiningStrategy::Sequential)
        }

        pub fn mine_with(&mut self, difficulty: u32, strategy: MiningStrategy) -> MiningReport {
            let start = self.nonce;
            if !meets_difficulty(&self.hash, difficulty) {
                let prefix = self.preimage_prefix();
                let found = match strategy {
                    MiningStrategy::Sequential => None,
                    MiningStrategy::Parallel => mine::search_parallel(&prefix, start, difficulty),
                };
                match found {
                    Some((nonce, hash)) => {
                        self.nonce = nonce;
                        self.hash = hash;
                    }
                    None => loop {
                        self.nonce = self.nonce.wrapping_add(1);
                        self.hash = hash_preimage(&prefix, self.nonce);
                        if meets_difficulty(&self.hash, difficulty) {
                            break;
                        }
                    },
                }
            }

            let report = MiningReport {
                index: self.index,
                nonce: self.nonce,
                hash: self.hash.clone(),
                attempts: self.nonce.wrapping_sub(start),
            };
            info!(
                nonce = report.nonce,
                attempts = report.attempts,
                "Block #{} mined: {}",
                report.index,
                report.hash
            );
            report
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice_to_bob() -> Vec<Transaction> {
        vec![Transaction::new("Alice", "Bob", 50)]
    }

    #[test]
    fn digest_matches_reference_vector() {
        let block = Block::new(1, alice_to_bob(), 1_700_000_000.5, "0");
        assert_eq!(
            block.hash(),
            "163c285e72a1f79480dd393649df16e8bd375f277f5c1b373b72044bcba7bb8c"
        );
        assert_eq!(block.digest(), block.hash());
    }

    #[test]
    fn genesis_payload_reference_vector() {
        let block = Block::new(0, Payload::genesis(), 1_600_000_000.0, "0");
        assert_eq!(
            block.hash(),
            "5e93e51dfae7484dbb61f9076c13bd5b07b426e459e76d33b77c9f50f5432134"
        );
    }

    #[test]
    fn digest_is_hash_of_concatenated_fields() {
        let block = Block::with_nonce(
            2,
            vec![Transaction::new("Bob", "Charlie", 25)],
            1_700_000_100.25,
            "abc",
            7,
        );
        let preimage =
            r#"2abc1700000100.25[{"amount": 25, "receiver": "Charlie", "sender": "Bob"}]7"#;
        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        let expected = hex::encode(hasher.finalize());
        assert_eq!(block.digest(), expected);
        assert_eq!(
            expected,
            "64b2d9d1e2451b52302ea3ab018dfd6ffde61a2b9ea166c1825850bab681c57f"
        );
    }

    #[test]
    fn digest_is_deterministic() {
        let block = Block::new(1, alice_to_bob(), Block::now(), "0");
        assert_eq!(block.digest(), block.digest());
        assert_eq!(block.clone().digest(), block.digest());
    }

    #[test]
    fn digest_does_not_overwrite_stored_hash() {
        let mut block = Block::new(1, alice_to_bob(), 1_700_000_000.5, "0");
        let stored = block.hash().to_string();
        block.replace_transactions(vec![Transaction::new("Alice", "Bob", 5000)].into());
        assert_ne!(block.digest(), stored);
        assert_eq!(block.hash(), stored);
    }

    #[test]
    fn block_hash_changes_with_nonce() {
        let a = Block::with_nonce(1, alice_to_bob(), 1_700_000_000.5, "0", 0);
        let b = Block::with_nonce(1, alice_to_bob(), 1_700_000_000.5, "0", 1);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn timestamp_formatting() {
        assert_eq!(format_timestamp(5.0), "5.0");
        assert_eq!(format_timestamp(1_600_000_000.0), "1600000000.0");
        assert_eq!(format_timestamp(1_700_000_000.5), "1700000000.5");
        assert_eq!(format_timestamp(0.1), "0.1");
        assert_eq!(format_timestamp(-0.0), "-0.0");
        assert_eq!(format_timestamp(0.0001), "0.0001");
        assert_eq!(format_timestamp(123_456_789_012_345.6), "123456789012345.6");
        assert_eq!(format_timestamp(9_999_999_999_999_998.0), "9999999999999998.0");
    }

    #[test]
    fn timestamp_formatting_exponent_and_non_finite() {
        assert_eq!(format_timestamp(1e16), "1e+16");
        assert_eq!(format_timestamp(1e22), "1e+22");
        assert_eq!(format_timestamp(1.5e20), "1.5e+20");
        assert_eq!(format_timestamp(1e-5), "1e-05");
        assert_eq!(format_timestamp(-2.5e-7), "-2.5e-07");
        assert_eq!(format_timestamp(f64::NAN), "nan");
        assert_eq!(format_timestamp(f64::INFINITY), "inf");
        assert_eq!(format_timestamp(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn meets_difficulty_examples() {
        assert!(pow::meets_difficulty("abc", 0));
        assert!(pow::meets_difficulty("000f", 3));
        assert!(!pow::meets_difficulty("00f0", 3));
        assert!(!pow::meets_difficulty("00", 3));
        assert!(!pow::meets_difficulty(&"0".repeat(64), 65));
        assert!(pow::meets_difficulty(&"0".repeat(64), 64));
    }

    #[test]
    fn mine_block_example() {
        let mut block = Block::new(1, alice_to_bob(), 1_700_000_000.5, "0");
        let report = block.mine(2);
        assert_eq!(report.nonce, 482);
        assert_eq!(report.attempts, 482);
        assert_eq!(
            block.hash(),
            "00cbbbcaae407e6fed806814774cf11bcbe90b696469694a2d02369d1391417a"
        );
        assert_eq!(block.nonce(), 482);
        assert_eq!(block.digest(), block.hash());
    }

    #[test]
    fn mining_postcondition_holds_for_small_difficulties() {
        for difficulty in 0..=4 {
            let mut block = Block::new(
                u64::from(difficulty),
                alice_to_bob(),
                1_700_000_000.5,
                "0",
            );
            block.mine(difficulty);
            let prefix = &block.hash()[..difficulty as usize];
            assert!(prefix.chars().all(|c| c == '0'), "difficulty {difficulty}");
            assert_eq!(block.digest(), block.hash());
        }
    }

    #[test]
    fn mine_zero_difficulty_keeps_nonce() {
        let mut block = Block::with_nonce(1, alice_to_bob(), 1_700_000_000.5, "0", 9);
        let before = block.hash().to_string();
        let report = block.mine(0);
        assert_eq!(report.attempts, 0);
        assert_eq!(block.nonce(), 9);
        assert_eq!(block.hash(), before);
    }

    #[test]
    fn parallel_search_finds_the_sequential_nonce() {
        let mut sequential = Block::new(1, alice_to_bob(), 1_700_000_000.5, "0");
        let mut parallel = sequential.clone();
        sequential.mine(2);
        let report = parallel.mine_with(2, MiningStrategy::Parallel);
        assert_eq!(report.nonce, sequential.nonce());
        assert_eq!(parallel.hash(), sequential.hash());
    }

    #[test]
    fn link_to_recomputes_hash() {
        let mut block = Block::new(1, alice_to_bob(), 1_700_000_000.5, "0");
        block.link_to("deadbeef");
        assert_eq!(block.previous_hash(), "deadbeef");
        assert_eq!(block.digest(), block.hash());
    }

    #[test]
    fn payload_display() {
        let payload = Payload::from(vec![
            Transaction::new("Alice", "Bob", 50),
            Transaction::new("Bob", "Charlie", 25),
        ]);
        assert_eq!(payload.to_string(), "[Alice -> Bob: 50, Bob -> Charlie: 25]");
        assert_eq!(Payload::genesis().to_string(), "Genesis Block");
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::new("Alice", "Bob", 10);
        let json = serde_json::to_string(&tx).unwrap();
        assert_eq!(json, r#"{"sender":"Alice","receiver":"Bob","amount":10}"#);
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }
}
