use clap::Parser;
use spacetimed::app_utils;
use spacetimed::block::genesis::build_genesis_block;
use spacetimed::block::proof_of_space::StructuralPoSpaceVerifier;
use spacetimed::block::validator::validate_bundle_against_peak;
use spacetimed::block::vdf::StructuralVdfVerifier;
use spacetimed::config::Config;
use spacetimed::constants::blockchain::MAX_BLOCK_COST;
use spacetimed::mempool::Mempool;
use spacetimed::network::gossip::GossipFilter;
use spacetimed::network::message::Message;
use spacetimed::network::peer::{self, ConnectionDirection, PeerRegistry};
use spacetimed::network::sync::{ClaimedPeak, SyncDecision, SyncEngine};
use spacetimed::network::wire;
use spacetimed::network_type::NetworkType;
use spacetimed::peer_manager::PeerManager;
use spacetimed::script::CostOnlyProgramRunner;
use spacetimed::shutdown::ShutdownManager;
use spacetimed::store::{AddResult, BlockchainStore};
use spacetimed::subscriptions::SubscriptionManager;
use spacetimed::time_sync::{TimeSync, WallClock};
use spacetimed::weight_proof::WeightProof;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "spacetimed")]
#[command(about = "proof-of-space-and-time full node", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[arg(long)]
    verbose: bool,

    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.generate_config {
        let config = Config::default();
        match config.save_to_file(&args.config) {
            Ok(_) => {
                println!("generated default config at {}", args.config);
                return;
            }
            Err(e) => {
                eprintln!("failed to generate config: {e}");
                std::process::exit(1);
            }
        }
    }

    let network_type = Config::load_from_file(&args.config)
        .map(|c| c.node.network_type())
        .unwrap_or(NetworkType::Testnet);

    let config = match Config::load_or_create(&args.config, &network_type) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    setup_logging(&config.logging, args.verbose);

    let network_type = config.node.network_type();
    let constants = network_type.constants();
    let p2p_addr = config.network.full_listen_address(&network_type);

    info!(?network_type, addr = %p2p_addr, data_dir = %config.storage.data_dir, "starting node");

    let mut shutdown_manager = ShutdownManager::new();
    let shutdown_token = shutdown_manager.token();

    let cache_size = app_utils::calculate_cache_size(config.storage.cache_size_mb);
    let db = match app_utils::open_database(&config.storage.data_dir, "chain", cache_size) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!(error = %e, "failed to open chain database");
            std::process::exit(1);
        }
    };

    let store = Arc::new(match BlockchainStore::open(db.clone()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open blockchain store");
            std::process::exit(1);
        }
    });

    let clock: Arc<dyn WallClock> = Arc::new(TimeSync::new());
    let pos_verifier = Arc::new(StructuralPoSpaceVerifier::default());
    let vdf_verifier = Arc::new(StructuralVdfVerifier);
    let runner = Arc::new(CostOnlyProgramRunner { cost_per_byte: 1 });

    if store.peak().unwrap_or(None).is_none() {
        let genesis = build_genesis_block(&constants);
        match store
            .add_block(
                genesis,
                clock.clone(),
                constants.clone(),
                pos_verifier.clone(),
                vdf_verifier.clone(),
                runner.clone(),
            )
            .await
        {
            Ok(AddResult::NewPeak(state)) => {
                info!(height = state.peak_height, "genesis block committed")
            }
            other => {
                error!(?other, "failed to commit genesis block");
                std::process::exit(1);
            }
        }
    }

    let mempool = Arc::new(tokio::sync::Mutex::new(Mempool::new(
        config.mempool.max_total_cost,
        config.mempool.rbf_fee_margin_percent,
    )));
    let sync_engine = Arc::new(tokio::sync::Mutex::new(SyncEngine::new(config.sync.clone())));
    let subscriptions = Arc::new(tokio::sync::Mutex::new(SubscriptionManager::new(
        config.storage.max_subscribe_items,
        config.storage.trusted_max_subscribe_items,
        config.storage.max_subscribe_response_items,
    )));
    let gossip_filter = Arc::new(GossipFilter::new());
    let registry = PeerRegistry::new();

    let peer_manager = Arc::new(PeerManager::new(db.clone(), config.network.clone()));
    if let Err(e) = peer_manager.load_from_disk().await {
        warn!(error = %e, "failed to load peer table from disk");
    }
    for addr in &config.network.bootstrap_peers {
        peer_manager.add_candidate(addr.clone()).await;
    }

    let (inbound_tx, mut inbound_rx) = tokio::sync::mpsc::unbounded_channel::<(String, Message, u16)>();

    let listener = match TcpListener::bind(&p2p_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %p2p_addr, error = %e, "failed to bind p2p listener");
            std::process::exit(1);
        }
    };

    let accept_task = {
        let registry = registry.clone();
        let inbound_tx = inbound_tx.clone();
        let peer_manager = peer_manager.clone();
        let shutdown_token = shutdown_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_token.cancelled() => break,
                    accepted = listener.accept() => {
                        let (stream, remote_addr) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => {
                                warn!(error = %e, "failed to accept inbound connection");
                                continue;
                            }
                        };
                        let ip = remote_addr.ip().to_string();
                        if peer_manager.is_banned(&ip).await {
                            continue;
                        }
                        let (reader, writer) = stream.into_split();
                        let peer_id = remote_addr.to_string();
                        let registry = registry.clone();
                        let inbound_tx = inbound_tx.clone();
                        tokio::spawn(async move {
                            let _ = peer::run_connection(
                                peer_id,
                                remote_addr,
                                ConnectionDirection::Inbound,
                                false,
                                reader,
                                writer,
                                registry,
                                inbound_tx,
                            )
                            .await;
                        });
                    }
                }
            }
        })
    };

    let liveness_task = tokio::spawn(peer::run_liveness_checker(registry.clone()));

    let dispatch_task = {
        let registry = registry.clone();
        let gossip_filter = gossip_filter.clone();
        let mempool = mempool.clone();
        let subscriptions = subscriptions.clone();
        let store = store.clone();
        let sync_engine = sync_engine.clone();
        let clock = clock.clone();
        let constants = constants.clone();
        let pos_verifier = pos_verifier.clone();
        let vdf_verifier = vdf_verifier.clone();
        let runner = runner.clone();
        let shutdown_token = shutdown_token.clone();
        tokio::spawn(async move {
            loop {
                let (from_peer, message, _request_id) = tokio::select! {
                    _ = shutdown_token.cancelled() => break,
                    next = inbound_rx.recv() => match next {
                        Some(v) => v,
                        None => break,
                    },
                };

                match message {
                    Message::NewTransaction { ref bundle } => {
                        let validation = validate_bundle_against_peak(
                            bundle,
                            store.as_ref(),
                            runner.as_ref(),
                            MAX_BLOCK_COST,
                        );
                        match validation {
                            Ok(validated) => {
                                let mut mp = mempool.lock().await;
                                match mp.add(bundle.clone(), validated.cost, validated.fee) {
                                    Ok(()) => {
                                        drop(mp);
                                        spacetimed::network::gossip::forward(
                                            &gossip_filter,
                                            &registry,
                                            &from_peer,
                                            message.clone(),
                                        )
                                        .await;
                                    }
                                    Err(e) => {
                                        warn!(peer = %from_peer, error = %e, "mempool rejected transaction");
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(peer = %from_peer, error = %e, "rejected transaction against current peak");
                            }
                        }
                    }
                    Message::NewSignagePoint { .. } | Message::NewUnfinishedBlock { .. } => {
                        spacetimed::network::gossip::forward(
                            &gossip_filter,
                            &registry,
                            &from_peer,
                            message,
                        )
                        .await;
                    }
                    Message::NewPeak { header_hash, height, weight } => {
                        spacetimed::network::gossip::forward(
                            &gossip_filter,
                            &registry,
                            &from_peer,
                            message.clone(),
                        )
                        .await;

                        let local_height = store.peak().ok().flatten().map(|s| s.peak_height).unwrap_or(0);
                        let decision = sync_engine.lock().await.record_peak(
                            ClaimedPeak {
                                peer_id: from_peer.clone(),
                                header_hash,
                                height,
                                weight,
                            },
                            local_height,
                        );

                        match decision {
                            Some(SyncDecision::StartShortSync { target_height, source_peer }) => {
                                if let Some(handle) = registry.get(&source_peer).await {
                                    let _ = handle.send(
                                        Message::RequestBlocks {
                                            start_height: local_height + 1,
                                            end_height: target_height + 1,
                                        },
                                        wire::NO_REQUEST_ID,
                                    );
                                }
                            }
                            Some(SyncDecision::StartLongSync { source_peer, .. }) => {
                                if let Some(handle) = registry.get(&source_peer).await {
                                    let _ = handle.send(
                                        Message::RequestWeightProof { tip_header_hash: header_hash },
                                        wire::NO_REQUEST_ID,
                                    );
                                }
                            }
                            Some(SyncDecision::AlreadySynced) | None => {}
                        }
                    }
                    Message::RequestBlock { header_hash } => {
                        let block = store.get_block(&header_hash).unwrap_or(None);
                        if let Some(handle) = registry.get(&from_peer).await {
                            let _ = handle.send(Message::RespondBlock { block }, wire::NO_REQUEST_ID);
                        }
                    }
                    Message::RespondBlock { block: Some(block) } => {
                        let height = block.header.height;
                        let prev_header_hash = block.header.prev_header_hash;
                        match store
                            .add_block(
                                block,
                                clock.clone(),
                                constants.clone(),
                                pos_verifier.clone(),
                                vdf_verifier.clone(),
                                runner.clone(),
                            )
                            .await
                        {
                            Ok(AddResult::NewPeak(state)) => {
                                info!(height = state.peak_height, peer = %from_peer, "committed synced block");
                                registry
                                    .broadcast(Message::NewPeak {
                                        header_hash: state.peak_header_hash,
                                        height: state.peak_height,
                                        weight: state.peak_weight,
                                    })
                                    .await;
                                if matches!(sync_engine.lock().await.state(), spacetimed::network::sync::SyncState::ShortSync { target_height } if *target_height <= state.peak_height)
                                {
                                    sync_engine.lock().await.mark_synced();
                                }
                            }
                            Ok(AddResult::Invalid(e)) => {
                                warn!(peer = %from_peer, height, error = %e, "peer served an invalid block");
                                sync_engine.lock().await.strike_peer(&from_peer);
                            }
                            Ok(AddResult::Disconnected) => {
                                if let Some(handle) = registry.get(&from_peer).await {
                                    let _ = handle.send(
                                        Message::RequestBlock { header_hash: prev_header_hash },
                                        wire::NO_REQUEST_ID,
                                    );
                                }
                            }
                            Ok(AddResult::AlreadyHave) | Ok(AddResult::AddedAsOrphan) => {}
                            Err(e) => {
                                error!(peer = %from_peer, error = %e, "store error while committing synced block");
                            }
                        }
                    }
                    Message::RespondBlock { block: None } => {}
                    Message::RequestBlocks { start_height, end_height } => {
                        let headers = store.headers_between(start_height, end_height).unwrap_or_default();
                        if let Some(handle) = registry.get(&from_peer).await {
                            let _ = handle.send(Message::RespondBlocks { headers }, wire::NO_REQUEST_ID);
                        }
                    }
                    Message::RespondBlocks { headers } => {
                        if let Some(handle) = registry.get(&from_peer).await {
                            for header in headers {
                                if store.get_header(&header.header_hash()).ok().flatten().is_none() {
                                    let _ = handle.send(
                                        Message::RequestBlock { header_hash: header.header_hash() },
                                        wire::NO_REQUEST_ID,
                                    );
                                }
                            }
                        }
                    }
                    Message::RequestWeightProof { .. } => {
                        match store.build_weight_proof(&constants) {
                            Ok(proof) => {
                                if let Some(handle) = registry.get(&from_peer).await {
                                    let _ = handle.send(
                                        Message::RespondWeightProof {
                                            summaries: proof.sub_epoch_summaries,
                                            sampled_headers: proof.sampled_headers,
                                        },
                                        wire::NO_REQUEST_ID,
                                    );
                                }
                            }
                            Err(e) => {
                                error!(peer = %from_peer, error = %e, "failed to build weight proof");
                            }
                        }
                    }
                    Message::RespondWeightProof { summaries, sampled_headers } => {
                        let proof = WeightProof {
                            sub_epoch_summaries: summaries,
                            sampled_headers,
                        };
                        let mut engine = sync_engine.lock().await;
                        match engine.accept_weight_proof(&proof, &constants) {
                            Ok(proven_weight) => {
                                let target_height = match engine.state() {
                                    spacetimed::network::sync::SyncState::LongSync { target_height, .. } => {
                                        *target_height
                                    }
                                    _ => 0,
                                };
                                info!(peer = %from_peer, proven_weight, target_height, "accepted weight proof, starting long sync download");
                                let local_height = store.peak().ok().flatten().map(|s| s.peak_height).unwrap_or(0);
                                drop(engine);
                                if let Some(handle) = registry.get(&from_peer).await {
                                    let _ = handle.send(
                                        Message::RequestBlocks {
                                            start_height: local_height + 1,
                                            end_height: target_height + 1,
                                        },
                                        wire::NO_REQUEST_ID,
                                    );
                                }
                            }
                            Err(e) => {
                                warn!(peer = %from_peer, error = %e, "rejected weight proof");
                                engine.strike_peer(&from_peer);
                            }
                        }
                    }
                    Message::Subscribe { puzzle_hashes, coin_ids } => {
                        let store = store.clone();
                        let store_for_coin = store.clone();
                        let mut subs = subscriptions.lock().await;
                        let response = subs.subscribe(
                            &from_peer,
                            false,
                            &puzzle_hashes,
                            &coin_ids,
                            |ph| store.get_coin_records_by_puzzle_hash(ph).unwrap_or_default(),
                            |id| store_for_coin.get_coin_record(id).unwrap_or(None),
                        );
                        if let Some(handle) = registry.get(&from_peer).await {
                            let _ = handle.send(
                                Message::RespondSubscription {
                                    records: response.records,
                                    is_final_page: response.is_final_page,
                                },
                                wire::NO_REQUEST_ID,
                            );
                        }
                    }
                    Message::RequestPeers => {
                        let addresses = peer_manager.known_addresses().await;
                        if let Some(handle) = registry.get(&from_peer).await {
                            let _ = handle.send(Message::RespondPeers { addresses }, wire::NO_REQUEST_ID);
                        }
                    }
                    _ => {}
                }
            }
        })
    };

    shutdown_manager.register_task(accept_task);
    shutdown_manager.register_task(liveness_task);
    shutdown_manager.register_task(dispatch_task);

    shutdown_manager.wait_for_shutdown().await;
    info!("shutdown complete");
}

fn setup_logging(config: &spacetimed::config::LoggingConfig, verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose { "trace" } else { &config.level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match config.format.as_str() {
        "json" => {
            fmt().json().with_env_filter(filter).with_thread_ids(false).init();
        }
        _ => {
            fmt().with_env_filter(filter).compact().init();
        }
    }
}
