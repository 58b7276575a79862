use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::RngCore;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use oblivion::config::DEFAULT_SCOPE_LABEL;
use oblivion::core::{Keypair, Principal, SystemClock};
use oblivion::service::LocalEncryptionService;
use oblivion::store::SqliteLedger;
use oblivion::{Inventory, InventoryClient, RegistryConfig, StoreRegistry};

const IDENTITY_FILE: &str = "identity.key";
const SERVICE_SEED_FILE: &str = "service.seed";
const LEDGER_FILE: &str = "oblivion.db";

#[derive(Debug, Parser)]
#[command(name = "oblivion")]
#[command(about = "Confidential inventory stores with encrypted quantities")]
struct Cli {
    /// Directory holding the service seed and the ledger.
    #[arg(long, env = "OBLIVION_DATA_DIR", default_value = "./oblivion-data")]
    data_dir: PathBuf,

    /// Identity seed file. Defaults to identity.key in the data directory.
    #[arg(long, env = "OBLIVION_IDENTITY")]
    identity: Option<PathBuf>,

    /// Label the store contract scope is derived from.
    #[arg(long, env = "OBLIVION_SCOPE", default_value = DEFAULT_SCOPE_LABEL)]
    scope: String,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print this identity's address and the store contract scope.
    Address,
    /// Create a store owned by this identity.
    CreateStore {
        #[arg(long)]
        name: String,
    },
    /// Rename this identity's store.
    RenameStore {
        #[arg(long)]
        name: String,
    },
    /// Encrypt a quantity and add or update an item.
    AddItem {
        #[arg(long)]
        name: String,
        #[arg(long)]
        quantity: u32,
    },
    /// Decrypt and print a store. Defaults to this identity's own store.
    DecryptStore {
        #[arg(long)]
        owner: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        if json {
            println!("{}", json!({ "error": format!("{:#}", err) }));
        } else {
            eprintln!("error: {:#}", err);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("creating data directory {}", cli.data_dir.display()))?;

    let identity_path = cli
        .identity
        .clone()
        .unwrap_or_else(|| cli.data_dir.join(IDENTITY_FILE));
    let identity = Keypair::from_seed(&load_or_create_seed(&identity_path)?);
    let service_seed = load_or_create_seed(&cli.data_dir.join(SERVICE_SEED_FILE))?;

    let ledger = Arc::new(
        SqliteLedger::open(cli.data_dir.join(LEDGER_FILE)).context("opening ledger")?,
    );
    let service = Arc::new(LocalEncryptionService::new(
        &service_seed,
        ledger.clone(),
        ledger.clone(),
        SystemClock,
    ));
    let config = RegistryConfig::with_scope_label(&cli.scope);
    let registry = StoreRegistry::new(ledger, service.clone(), config.clone());
    let client = InventoryClient::new(identity, service, SystemClock, config);
    let me = client.principal();

    match cli.cmd {
        Command::Address => report(
            cli.json,
            json!({ "address": me.to_hex(), "scope": registry.scope().to_hex() }),
            format!("Address: {}\nStore scope: {}", me, registry.scope()),
        ),
        Command::CreateStore { name } => {
            registry.create_store(&me, &name).await?;
            report(
                cli.json,
                json!({ "owner": me.to_hex(), "name": name }),
                format!("Store created: {}", name),
            )
        }
        Command::RenameStore { name } => {
            registry.rename_store(&me, &name).await?;
            report(
                cli.json,
                json!({ "owner": me.to_hex(), "name": name }),
                format!("Store renamed to: {}", name),
            )
        }
        Command::AddItem { name, quantity } => {
            let input = client.encrypt_quantity(quantity).await?;
            let handle = registry
                .add_or_update_item(&me, &name, &input.handle, &input.proof)
                .await?;
            report(
                cli.json,
                json!({ "item": name, "handle": handle.to_hex() }),
                format!("Item {} set (encrypted: {})", name, handle),
            )
        }
        Command::DecryptStore { owner } => {
            let owner = match owner {
                Some(hex) => Principal::from_hex(&hex)
                    .with_context(|| format!("parsing owner address {:?}", hex))?,
                None => me,
            };
            let inventory = client.decrypt_inventory(&registry, &owner).await?;
            report(cli.json, inventory_json(&inventory), inventory_text(&inventory))
        }
    }

    Ok(())
}

fn report(json: bool, value: serde_json::Value, text: String) {
    if json {
        println!("{}", value);
    } else {
        println!("{}", text);
    }
}

fn inventory_json(inventory: &Inventory) -> serde_json::Value {
    let items: Vec<serde_json::Value> = inventory
        .items
        .iter()
        .map(|line| {
            json!({
                "name": line.name,
                "quantity": line.quantity,
                "handle": line.handle.to_hex(),
            })
        })
        .collect();

    json!({
        "owner": inventory.owner.to_hex(),
        "name": inventory.name,
        "items": items,
    })
}

fn inventory_text(inventory: &Inventory) -> String {
    let mut out = format!("Store name: {}", inventory.name);
    if inventory.items.is_empty() {
        out.push_str("\nNo items stored yet.");
    }
    for line in &inventory.items {
        out.push_str(&format!(
            "\n- {} => {} (encrypted: {})",
            line.name, line.quantity, line.handle
        ));
    }
    out
}

/// Read a hex seed file, creating it with a random seed if absent.
fn load_or_create_seed(path: &Path) -> Result<[u8; 32]> {
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading seed {}", path.display()))?;
        let bytes = hex::decode(text.trim())
            .with_context(|| format!("decoding seed {}", path.display()))?;
        return bytes.try_into().map_err(|b: Vec<u8>| {
            anyhow::anyhow!("seed {} has {} bytes, expected 32", path.display(), b.len())
        });
    }

    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    fs::write(path, hex::encode(seed))
        .with_context(|| format!("writing seed {}", path.display()))?;
    tracing::info!(path = %path.display(), "generated new seed");
    Ok(seed)
}
