use core::str::FromStr;
use std::process::ExitCode;

use candy_guard::guards::{GuardSet, StartDate};
use candy_guard::instruction::Collection;
use candy_guard::rpc::RpcLedger;
use candy_guard::state::CandyGuardData;
use candy_guard::transaction::{Confirmation, InstructionGroup, MintFlow};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use solana_sdk::signer::keypair::Keypair;


type Result<T = (), E = Error> = core::result::Result<T, E>;


/// Settings read from the environment.
struct Config {
    /// `RPC_URL`; local validator by default.
    rpc_url: String,
    /// `KEYPAIR`; `~/.config/solana/id.json` by default.
    keypair: std::path::PathBuf,
    /// `CANDY_MACHINE`; the machine to wrap.  The keypair must be its
    /// authority.
    candy_machine: Pubkey,
    /// `COLLECTION_MINT`; the machine’s collection.  The keypair must be its
    /// update authority.
    collection_mint: Pubkey,
}

impl Config {
    fn from_env() -> Result<Self> {
        let rpc_url = std::env::var("RPC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8899".into());
        let keypair = match std::env::var_os("KEYPAIR") {
            Some(path) => path.into(),
            None => {
                let home = std::env::var_os("HOME").ok_or(Error::Env("HOME"))?;
                let mut path = std::path::PathBuf::from(home);
                path.push(".config/solana/id.json");
                path
            }
        };
        Ok(Self {
            rpc_url,
            keypair,
            candy_machine: pubkey_var("CANDY_MACHINE")?,
            collection_mint: pubkey_var("COLLECTION_MINT")?,
        })
    }
}

fn pubkey_var(name: &'static str) -> Result<Pubkey> {
    let value = std::env::var(name).map_err(|_| Error::Env(name))?;
    Pubkey::from_str(value.as_str()).map_err(|_| Error::Env(name))
}


/// `usage: mint-client [<start-date>]`
///
/// Deploys a candy guard with a start date guard (now by default) over an
/// existing candy machine and mints one NFT through it.
#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    if let Err(err) = run().await {
        eprintln!("{err}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}


/// Executes the program.
async fn run() -> Result {
    let start_date = parse_args()?;
    let config = Config::from_env()?;
    let keypair =
        solana_sdk::signer::keypair::read_keypair_file(&config.keypair)
            .map_err(Error::from)?;
    log::info!("using RPC node at {}", config.rpc_url);
    let ledger = RpcLedger::new(&config.rpc_url);

    let collection = Collection {
        mint: config.collection_mint,
        update_authority: keypair.pubkey(),
    };
    let mut flow =
        MintFlow::new(&ledger, &keypair, config.candy_machine, collection);

    eprintln!("Deploying candy guard…");
    flow.create_accounts(InstructionGroup::new(), &[]).await?;
    let guards = GuardSet::new().with(StartDate { date: start_date });
    let data = CandyGuardData::new(guards);
    print_logs(&flow.initialize(data).await?);
    if let Some(address) = flow.candy_guard() {
        eprintln!("Candy guard: {address}");
    }

    eprintln!();
    eprintln!("Wrapping candy machine {}…", config.candy_machine);
    print_logs(&flow.wrap().await?);

    eprintln!();
    eprintln!("Preparing NFT mint…");
    let nft_mint = Keypair::new();
    print_logs(&flow.prepare_mint(&keypair, &nft_mint).await?);

    eprintln!();
    eprintln!("Minting {}…", nft_mint.pubkey());
    print_logs(&flow.mint(&keypair, None, Vec::new(), &[]).await?);
    Ok(())
}


/// Parses the command line arguments and returns the start date.
fn parse_args() -> Result<i64> {
    match std::env::args().nth(1) {
        Some(date) => i64::from_str(date.as_str()).map_err(|_| Error::Usage),
        None => Ok(std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as i64)),
    }
}


/// Prints program log messages of a confirmed transaction.
fn print_logs(confirmation: &Confirmation) {
    eprintln!("Signature: {}", confirmation.signature);
    for msg in confirmation.logs.iter() {
        println!("{msg}");
    }
}


#[derive(derive_more::From, derive_more::Display)]
enum Error {
    #[display("usage: mint-client [<start-date>]")]
    #[from(ignore)]
    Usage,
    #[display("missing or invalid {_0} environment variable")]
    #[from(ignore)]
    Env(&'static str),
    Guard(candy_guard::Error),
    Box(Box<dyn std::error::Error>),
}
