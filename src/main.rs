//! Zakat Ledger CLI Application
//!
//! A command-line interface for operating the ledger and serving its REST API.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use zakat_ledger::api::{create_router, ApiState};
use zakat_ledger::cli::{self, AppState};
use zakat_ledger::config::SEAL_KEY_ENV;
use zakat_ledger::core::Amount;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(version = "0.1.0")]
#[command(about = "A single-node UTXO ledger with proof-of-work blocks and zakat", long_about = None)]
struct Cli {
    /// Data directory for ledger storage
    #[arg(short, long, default_value = ".zakat_ledger")]
    data_dir: PathBuf,

    /// Override the configured mining difficulty
    #[arg(long, global = true)]
    difficulty: Option<u32>,

    /// Key used to seal wallet private keys
    #[arg(long, env = SEAL_KEY_ENV, hide_env_values = true)]
    seal_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new ledger
    Init,

    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Send coins to another wallet
    Send {
        /// Sender wallet id (its key must be in the wallets directory)
        #[arg(short, long)]
        from: String,

        /// Receiver wallet id
        #[arg(short, long)]
        to: String,

        /// Amount in coins, up to 8 decimal places
        #[arg(short, long)]
        amount: Amount,

        /// Free-text note
        #[arg(short, long, default_value = "")]
        note: String,
    },

    /// Mine the pending transactions into a block
    Mine {
        /// Wallet credited as the miner
        #[arg(short, long)]
        miner: String,
    },

    /// Queue zakat deductions for every funded wallet
    Zakat,

    /// Chain operations
    Chain {
        #[command(subcommand)]
        action: ChainCommands,
    },

    /// Validate the chain
    Validate,

    /// Show pending transactions
    Pending,

    /// Recompute cached balances from unspent outputs
    Reconcile,

    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Seconds a mining request may run before it is cancelled
        #[arg(long, default_value = "120")]
        mining_timeout: u64,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Create a new wallet
    New {
        /// Owning user reference
        #[arg(short, long)]
        user: Option<String>,
    },
    /// List all wallets
    List,
    /// Show wallet balance
    Balance {
        /// Wallet id
        wallet_id: String,
    },
}

#[derive(Subcommand)]
enum ChainCommands {
    /// Show chain info
    Info,
    /// List recent blocks
    Blocks {
        /// Number of blocks to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let seal_key = cli.seal_key.as_deref();
    let data_dir = cli.data_dir.as_path();
    let difficulty = cli.difficulty;

    // Every command except init works on the loaded ledger
    let open = || AppState::open(data_dir, seal_key, difficulty);

    match cli.command {
        Commands::Init => {
            cli::cmd_init(data_dir, difficulty, seal_key)?;
        }

        Commands::Serve {
            port,
            mining_timeout,
        } => {
            run_api_server(open()?, port, Duration::from_secs(mining_timeout))?;
        }

        Commands::Wallet { action } => match action {
            WalletCommands::New { user } => {
                cli::cmd_wallet_new(&open()?, user)?;
            }
            WalletCommands::List => {
                cli::cmd_wallet_list(&open()?)?;
            }
            WalletCommands::Balance { wallet_id } => {
                cli::cmd_wallet_balance(&open()?, &wallet_id)?;
            }
        },

        Commands::Send {
            from,
            to,
            amount,
            note,
        } => {
            cli::cmd_send(&open()?, &from, &to, amount, &note)?;
        }

        Commands::Mine { miner } => {
            cli::cmd_mine(&open()?, &miner)?;
        }

        Commands::Zakat => {
            cli::cmd_zakat(&open()?)?;
        }

        Commands::Chain { action } => match action {
            ChainCommands::Info => {
                cli::cmd_chain_info(&open()?)?;
            }
            ChainCommands::Blocks { count } => {
                cli::cmd_chain_blocks(&open()?, count)?;
            }
        },

        Commands::Validate => {
            cli::cmd_validate(&open()?)?;
        }

        Commands::Pending => {
            cli::cmd_pending(&open()?)?;
        }

        Commands::Reconcile => {
            cli::cmd_reconcile(&open()?)?;
        }
    }

    Ok(())
}

fn run_api_server(
    state: AppState,
    port: u16,
    mining_timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let api_state = ApiState::new(Arc::clone(&state.ledger), Some(Arc::clone(&state.storage)))
            .with_mining_timeout(mining_timeout);
        let app = create_router(api_state);

        let addr = format!("0.0.0.0:{}", port);
        println!("🚀 REST API server starting on http://localhost:{}", port);
        print_endpoints(&state.data_dir);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                tokio::signal::ctrl_c().await.ok();
                println!("\n📴 Shutting down API server...");
            })
            .await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    state.save()?;
    Ok(())
}

fn print_endpoints(data_dir: &Path) {
    println!("   📁 Data directory: {:?}", data_dir);
    println!();
    println!("📖 Available endpoints:");
    println!("   GET  /health                       - Health check");
    println!("   GET  /api/chain                    - Chain info and blocks");
    println!("   GET  /api/chain/validate           - Validate chain");
    println!("   GET  /api/blocks/{{hash}}            - Get block");
    println!("   GET  /api/wallets                  - List wallets");
    println!("   POST /api/wallets                  - Create wallet");
    println!("   GET  /api/wallets/{{id}}/balance     - Wallet balance");
    println!("   GET  /api/wallets/{{id}}/utxos       - Unspent outputs");
    println!("   GET  /api/wallets/{{id}}/history     - Transaction history");
    println!("   GET  /api/wallets/{{id}}/zakat       - Zakat records");
    println!("   POST /api/transactions             - Submit transaction");
    println!("   GET  /api/transactions/pending     - Pending pool");
    println!("   POST /api/mine                     - Mine block");
    println!("   GET  /api/mining/status            - Mining status");
    println!("   POST /api/zakat/run                - Run zakat batch");
}
