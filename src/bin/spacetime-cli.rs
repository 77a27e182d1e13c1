//! Minimal read-only CLI: reports the local chain's peak. Anything beyond
//! read-only inspection (submitting transactions, admin commands) would
//! need an RPC surface, which is out of scope here.

use clap::Parser;
use spacetimed::app_utils;
use spacetimed::config::Config;
use spacetimed::network_type::NetworkType;
use spacetimed::store::BlockchainStore;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "spacetime-cli")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

fn main() {
    let args = Args::parse();

    let network_type = Config::load_from_file(&args.config)
        .map(|c| c.node.network_type())
        .unwrap_or(NetworkType::Testnet);

    let config = match Config::load_from_file(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load config at {}: {e}", args.config);
            std::process::exit(1);
        }
    };
    let _ = network_type;

    let cache_size = app_utils::calculate_cache_size(config.storage.cache_size_mb);
    let db = match app_utils::open_database(&config.storage.data_dir, "chain", cache_size) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("failed to open chain database: {e}");
            std::process::exit(1);
        }
    };

    let store = match BlockchainStore::open(db) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to open blockchain store: {e}");
            std::process::exit(1);
        }
    };

    match store.peak() {
        Ok(Some(peak)) => {
            println!("peak height:      {}", peak.peak_height);
            println!("peak header hash: {}", hex::encode(peak.peak_header_hash));
            println!("peak weight:      {}", peak.peak_weight);
        }
        Ok(None) => println!("no blocks yet"),
        Err(e) => {
            eprintln!("failed to read peak: {e}");
            std::process::exit(1);
        }
    }
}
