//! Paper Tanks Server
//!
//! Runs one of three modes:
//! - `solo`: local authority with a scripted player, logs the round
//! - `server`: authoritative multiplayer host
//! - `client`: headless client that readies up and drives its tank
//!
//! The mode comes from the first argument, then `PAPER_TANKS_MODE`.

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paper_tanks::{
    assets::{AssetError, DirectoryAssets, MemoryAssets},
    config::{GameConfig, NetConfig, ServerConfig},
    game::{
        engine::{EngineError, GameInstance, Role, PHASE_DEFEAT, PHASE_VICTORY},
        events::{GameEvent, GameEventData},
        input::{Action, PlayerInput},
        level::{LevelError, LEVEL_FORMAT},
        object::ObjectId,
    },
    network::{
        lobby::Lobby,
        manager::{Link, NetworkManager},
        session::{ClientSession, ServerSession},
        transport::{TcpClient, TcpServer},
    },
    Vec2, TICK_RATE, VERSION,
};

/// Level compiled into the binary, used when the assets directory has none.
const BUILTIN_LEVEL: &str = include_str!("../assets/level1.json");
const BUILTIN_LEVEL_NAME: &str = "level1";

/// Solo rounds give up after this long.
const SOLO_MAX_SECONDS: u32 = 180;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let game = GameConfig::from_env()?;
    let net = NetConfig::from_env()?;
    let server = ServerConfig::from_env()?;

    init_tracing(&game.log_level);

    let mode = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PAPER_TANKS_MODE").ok())
        .unwrap_or_else(|| "solo".to_string());

    info!("Paper Tanks v{}", VERSION);
    info!("Tick Rate: {} Hz (default {})", game.tick_rate, TICK_RATE);
    info!("Mode: {}", mode);

    match mode.as_str() {
        "solo" => run_solo(&game).await,
        "server" => run_server(&game, &net, &server).await,
        "client" => run_client(&game, &net, &server).await,
        other => anyhow::bail!("unknown mode {other:?} (expected solo, server or client)"),
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}

/// Load the configured level from disk, falling back to the built-in one.
fn load_level(engine: &mut GameInstance, config: &GameConfig) -> anyhow::Result<()> {
    let disk = DirectoryAssets::new(&config.assets_dir);
    match engine.load_level_from(&disk, &config.level) {
        Err(EngineError::Level(LevelError::Asset(AssetError::NotFound { .. }))) => {
            warn!(
                level = %config.level,
                dir = %config.assets_dir,
                "Level not found on disk, using built-in level"
            );
            let builtin = MemoryAssets::new().with(LEVEL_FORMAT, BUILTIN_LEVEL_NAME, BUILTIN_LEVEL);
            engine.load_level_from(&builtin, BUILTIN_LEVEL_NAME)?;
        }
        other => other?,
    }
    Ok(())
}

/// Scripted input: turn every 1.5 s, fire every 0.75 s.
fn scripted_input(tick: u64, tick_rate: u32) -> PlayerInput {
    let rate = u64::from(tick_rate.max(1));
    let heading = match (tick / (rate + rate / 2)) % 4 {
        0 => Vec2::RIGHT,
        1 => Vec2::DOWN,
        2 => Vec2::LEFT,
        _ => Vec2::UP,
    };
    let input = PlayerInput::default().with_movement(heading);
    if tick % (rate * 3 / 4).max(1) == 0 {
        input.with_action(Action::Fire)
    } else {
        input
    }
}

fn short(id: &ObjectId) -> String {
    hex::encode(&id.as_bytes()[..4])
}

fn log_event(event: &GameEvent) {
    match &event.data {
        GameEventData::TankHit { tank, attacker, remaining_health, .. } => {
            info!("Tank {} hit by {} ({:.0} hp left)", short(tank), short(attacker), remaining_health);
        }
        GameEventData::TankDestroyed { tank, .. } => {
            info!("Tank {} destroyed", short(tank));
        }
        GameEventData::PickupCollected { tank, kind, .. } => {
            info!("Tank {} collected {:?}", short(tank), kind);
        }
        GameEventData::PlayerJoined { client, tank } => {
            info!("{} joined with tank {}", client, short(tank));
        }
        GameEventData::PlayerLeft { client, .. } => {
            info!("{} left", client);
        }
        GameEventData::ModeChanged { mode } => {
            info!("Mode: {}", mode);
        }
        GameEventData::ProjectileFired { .. } => {}
    }
}

// =============================================================================
// SOLO
// =============================================================================

async fn run_solo(config: &GameConfig) -> anyhow::Result<()> {
    info!("=== Starting Solo Round ===");
    info!("RNG Seed: {}", config.seed);

    let mut engine = GameInstance::new(Role::SinglePlayer, config.seed);
    load_level(&mut engine, config)?;
    let player = engine
        .local_player()
        .ok_or_else(|| anyhow::anyhow!("level loaded without a player tank"))?;
    info!("Player tank {}", short(&player));

    let dt = config.tick_seconds();
    let max_ticks = u64::from(SOLO_MAX_SECONDS) * u64::from(config.tick_rate);
    let mut ticker = interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut total_events = 0usize;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let tick = engine.current_tick() + 1;
        let mut input = scripted_input(tick, config.tick_rate);
        input.sequence = tick as u32;
        input.timestamp = engine.clock_ms();
        if let Err(e) = engine.apply_input(&player, &input) {
            warn!(error = %e, "Scripted input rejected");
        }

        let result = engine.tick(dt);
        total_events += result.events.len();
        result.events.iter().for_each(log_event);

        if result.tick % (u64::from(config.tick_rate) * 10) == 0 {
            info!(
                "Tick {}: {} objects, {} contacts, {} events so far",
                result.tick,
                engine.objects().len(),
                result.stats.contacts,
                total_events
            );
        }

        let phase = engine.phase();
        if phase == PHASE_VICTORY || phase == PHASE_DEFEAT {
            info!("Round over at tick {}: {}", result.tick, phase);
            break;
        }
        if result.tick >= max_ticks {
            info!("Time limit reached at tick {}", result.tick);
            break;
        }
    }

    info!("=== Round Results ===");
    info!("Phase: {}", engine.phase());
    info!("Total events: {}", total_events);
    Ok(())
}

// =============================================================================
// SERVER
// =============================================================================

async fn run_server(game: &GameConfig, net: &NetConfig, config: &ServerConfig) -> anyhow::Result<()> {
    let listener = TcpServer::bind(config.addr, net.transport(), config.max_connections).await?;
    let addr = listener.local_addr()?;
    let (handle, events) = listener.start()?;
    info!("Server listening on {}", addr);

    let mut engine = GameInstance::new(Role::Server, game.seed);
    load_level(&mut engine, game)?;

    let manager = NetworkManager::new(Link::Server(handle), events, &net.manager());
    let mut session = ServerSession::new(
        engine,
        manager,
        Lobby::new(config.countdown_seconds),
        game.tick_seconds(),
    );

    let mut ticker = interval(game.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }
        let result = session.step();
        result.events.iter().for_each(log_event);
    }

    session.shutdown();
    // Let the send loops flush their shutdown
    tokio::time::sleep(Duration::from_millis(100)).await;
    info!("Server shutdown complete");
    Ok(())
}

// =============================================================================
// CLIENT
// =============================================================================

async fn run_client(game: &GameConfig, net: &NetConfig, config: &ServerConfig) -> anyhow::Result<()> {
    let (conn, events) = TcpClient::connect(config.addr, net.transport()).await?;
    info!("Connected to {}", config.addr);

    let manager = NetworkManager::new(Link::Client(conn), events, &net.manager());
    let mut session = ClientSession::new(
        GameInstance::new(Role::Client, game.seed),
        manager,
        game.tick_seconds(),
    );

    let mut ticker = interval(game.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut ready_sent = false;
    let mut last_countdown = None;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let has_tank = session.engine().local_player().is_some();
        if has_tank && !ready_sent {
            session.set_ready(true)?;
            ready_sent = true;
            info!("Ready");
        }

        let input = has_tank.then(|| scripted_input(session.engine().current_tick(), game.tick_rate));
        session.step(input);

        if session.countdown() != last_countdown {
            last_countdown = session.countdown();
            if let Some(seconds) = last_countdown {
                info!("Round starts in {}", seconds);
            }
        }
        if !session.is_connected() {
            warn!("Server closed the connection");
            break;
        }
    }

    session.shutdown();
    info!("Client stopped after {} shots heard", session.shots_heard());
    Ok(())
}
