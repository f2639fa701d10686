//! Demo binary.
//!
//! Usage:
//!   cargo run -p sprite_demo -- [publisher|subscriber] [--addr 127.0.0.1:5555]
//!       [--entities sprites.json] [--config sync.json] [--frames N]
//!       [--frame-delay-ms 16] [--topic T]
//!
//! Without a role argument the process is a subscriber. The publisher moves
//! the texture sprite and broadcasts positions every frame; the subscriber
//! mirrors them. Both save their scene to the entity file on exit.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use sprite_demo::{app::AppState, bootstrap::load_entities, SpriteDemo};
use sprite_shared::{
    config::SyncConfig,
    render::LogRenderer,
    store::EntityStore,
    sync::{Role, SyncChannel},
};
use tracing::{info, warn};

struct Args {
    role: Role,
    config: Option<PathBuf>,
    addr: Option<String>,
    entities: Option<String>,
    topic: Option<String>,
    frames: Option<u64>,
    frame_delay_ms: Option<u64>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut out = Args {
        role: Role::default(),
        config: None,
        addr: None,
        entities: None,
        topic: None,
        frames: None,
        frame_delay_ms: None,
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                out.config = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--addr" if i + 1 < args.len() => {
                out.addr = Some(args[i + 1].clone());
                i += 2;
            }
            "--entities" if i + 1 < args.len() => {
                out.entities = Some(args[i + 1].clone());
                i += 2;
            }
            "--topic" if i + 1 < args.len() => {
                out.topic = Some(args[i + 1].clone());
                i += 2;
            }
            "--frames" if i + 1 < args.len() => {
                out.frames = Some(args[i + 1].parse().context("parse --frames")?);
                i += 2;
            }
            "--frame-delay-ms" if i + 1 < args.len() => {
                out.frame_delay_ms = Some(args[i + 1].parse().context("parse --frame-delay-ms")?);
                i += 2;
            }
            other => {
                match other.trim_start_matches("--").parse::<Role>() {
                    Ok(role) => out.role = role,
                    Err(e) => warn!(arg = %other, error = %e, "Ignoring argument"),
                }
                i += 1;
            }
        }
    }
    Ok(out)
}

fn build_config(args: &Args) -> anyhow::Result<SyncConfig> {
    let mut cfg = match &args.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };
    if let Some(addr) = &args.addr {
        cfg.endpoint = addr.clone();
    }
    if let Some(path) = &args.entities {
        cfg.entities_path = path.clone();
    }
    if let Some(topic) = &args.topic {
        cfg.topic = topic.clone();
    }
    if let Some(frames) = args.frames {
        cfg.max_frames = Some(frames);
    }
    if let Some(ms) = args.frame_delay_ms {
        cfg.frame_delay_ms = ms;
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args()?;
    let cfg = build_config(&args)?;
    info!(
        role = %args.role,
        endpoint = %cfg.endpoint,
        entities = %cfg.entities_path,
        wire_len = cfg.wire.message_len(),
        "Starting sprite demo"
    );

    let store = EntityStore::new(&cfg.entities_path);
    let entities = load_entities(&store).context("load entities")?;
    let state = AppState::from_entities(entities);

    let channel = SyncChannel::open(args.role, &cfg)
        .await
        .with_context(|| format!("open {} channel on {}", args.role, cfg.endpoint))?;

    let mut demo = SpriteDemo::new(state, channel, Box::new(LogRenderer::default()));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    demo.run(
        Duration::from_millis(cfg.frame_delay_ms),
        cfg.max_frames,
        shutdown,
    )
    .await;

    store
        .save(&demo.state.to_entities())
        .context("save entities")?;
    info!(frames = demo.frame(), stats = ?demo.stats(), "Finished");
    Ok(())
}
