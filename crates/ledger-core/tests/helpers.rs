use ledger_core::{Block, Blockchain, Transaction};

pub const BASE_TIMESTAMP: f64 = 1_700_000_000.5;

pub fn transfer(sender: &str, receiver: &str, amount: u64) -> Vec<Transaction> {
    vec![Transaction::new(sender, receiver, amount)]
}

/// A candidate block as a caller would build it: previous hash left as a
/// placeholder for `append` to fill in.
pub fn candidate(index: u64, sender: &str, receiver: &str, amount: u64) -> Block {
    Block::new(index, transfer(sender, receiver, amount), Block::now(), "")
}

/// Genesis plus Alice -> Bob (50) and Bob -> Charlie (25).
pub fn demo_chain(difficulty: u32) -> Blockchain {
    let mut chain = Blockchain::with_difficulty(difficulty);
    chain.append(candidate(1, "Alice", "Bob", 50));
    chain.append(candidate(2, "Bob", "Charlie", 25));
    chain
}
