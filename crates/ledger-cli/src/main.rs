use anyhow::Result;
use clap::Parser;
use ledger_core::{Block, Blockchain, ChainConfig, MiningStrategy, Rehash, Transaction};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Mine a small demo ledger, validate it, then tamper with it")]
struct Cli {
    /// Leading hex zeros required of every mined block hash
    #[arg(long, default_value_t = ledger_core::constants::DEFAULT_DIFFICULTY)]
    difficulty: u32,
    /// Search nonces on all cores
    #[arg(long)]
    parallel: bool,
    /// Amount written into block 1 when simulating the attack
    #[arg(long, default_value_t = 5000)]
    tamper_amount: u64,
    /// Print the chain as JSON instead of the text listing
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let strategy = if cli.parallel {
        MiningStrategy::Parallel
    } else {
        MiningStrategy::Sequential
    };
    let mut chain = Blockchain::with_config(ChainConfig {
        difficulty: cli.difficulty,
        strategy,
    });
    info!(difficulty = cli.difficulty, ?strategy, "chain created");

    let transfers = [("Alice", "Bob", 50), ("Bob", "Charlie", 25)];
    for (index, (sender, receiver, amount)) in (1u64..).zip(transfers) {
        println!("Mining block {index}...");
        let block = Block::new(
            index,
            vec![Transaction::new(sender, receiver, amount)],
            Block::now(),
            chain.latest().hash(),
        );
        chain.append(block);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&chain)?);
    } else {
        println!("\n--- Full Blockchain ---");
        print!("{chain}");
    }

    println!("\nBlockchain valid? {}", chain.validate());

    println!("\n*** Tampering with block data ***");
    chain.simulate_tamper(
        1,
        vec![Transaction::new("Alice", "Bob", cli.tamper_amount)],
        Rehash::Recompute,
    )?;
    let outcome = chain.verify();
    println!("Blockchain valid after tampering? {}", outcome.is_ok());
    if let Err(err) = outcome {
        println!("{err}");
    }
    Ok(())
}
