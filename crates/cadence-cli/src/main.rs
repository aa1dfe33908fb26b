//! cadence - scheduler demo runner
//!
//! In-memory ports only. `poison` drives one effect chain to completion,
//! `battle` runs a battle cycle, asks it to stop and then drops the target.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cadence_core::app::{ActionError, Scheduler, SchedulerConfig};
use cadence_core::domain::{
    Actor, ActorRef, AppliedEffect, EffectDefinition, FixedMagnitude, Notification,
};
use cadence_core::impls::{
    ChannelNotifier, DeathRouter, InMemoryEntityStore, InMemoryFlagStore, LocalJobRuntime,
    LoggingDeathHandler, TokioTimer,
};
use cadence_core::ports::{Clock, EntityStore, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "cadence", version, about = "Timed action scheduler demos")]
struct Cli {
    /// Scheduler config (TOML). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a damage-over-time effect and print every notification.
    Poison {
        #[arg(long, default_value_t = 100)]
        health: i32,
        #[arg(long, default_value_t = 1)]
        damage: i32,
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,
        #[arg(long, default_value_t = 3000)]
        duration_ms: u64,
    },
    /// Run a battle cycle, request a stop, then clear the target.
    Battle {
        #[arg(long, default_value = "npc-1")]
        actor: String,
        #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,
        /// Swings before the stop request.
        #[arg(long, default_value_t = 3)]
        swings: u32,
    },
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

struct Demo {
    scheduler: Scheduler,
    store: Arc<InMemoryEntityStore>,
    jobs: Arc<LocalJobRuntime>,
}

fn wire(config: SchedulerConfig) -> Result<(Demo, UnboundedReceiver<Notification>), Box<dyn Error>> {
    let store = Arc::new(InMemoryEntityStore::new());
    let jobs = Arc::new(LocalJobRuntime::new());
    let (notifier, notes) = ChannelNotifier::new();
    let scheduler = Scheduler::builder()
        .config(config)
        .entity_store(store.clone())
        .flag_store(Arc::new(InMemoryFlagStore::new()))
        .job_runtime(jobs.clone())
        .timer(Arc::new(TokioTimer))
        .death_handler(Arc::new(DeathRouter::new(
            Arc::new(LoggingDeathHandler),
            Arc::new(LoggingDeathHandler),
        )))
        .notifier(Arc::new(notifier))
        .build()?;
    Ok((
        Demo {
            scheduler,
            store,
            jobs,
        },
        notes,
    ))
}

async fn run_poison(
    config: SchedulerConfig,
    health: i32,
    damage: i32,
    interval: Duration,
    duration: Duration,
) -> Result<(), Box<dyn Error>> {
    let (demo, mut notes) = wire(config)?;
    let hero = ActorRef::character("hero");
    let spider = ActorRef::npc("spider");
    let now = SystemClock.now_ms();

    demo.store
        .save(
            Actor::new(hero.clone(), health)
                .with_effect(AppliedEffect::new("poison", now).with_source(spider.clone())),
        )
        .await?;
    demo.store.save(Actor::new(spider.clone(), 30)).await?;

    let printer = tokio::spawn(async move {
        while let Some(note) = notes.recv().await {
            match serde_json::to_string(&note) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("encode failed: {e}"),
            }
        }
    });

    let poison = EffectDefinition::new("poison", interval, Arc::new(FixedMagnitude(damage)))
        .with_total_duration(duration);
    demo.scheduler.effects().start(Arc::new(poison), hero.clone(), spider);

    // 最初の tick が走るまで待ってから、チェーンが消えるのを待つ
    tokio::time::sleep(Duration::from_millis(10)).await;
    while demo.scheduler.effects().live_chains() > 0 {
        tokio::time::sleep(interval / 4).await;
    }

    if let Some(after) = demo.store.find_by_id(&hero).await? {
        info!(health = after.health, alive = after.is_alive, "poison_demo_done");
    }
    println!("{}", serde_json::to_string(&demo.scheduler.status().await)?);

    drop(demo);
    printer.abort();
    Ok(())
}

async fn run_battle(
    config: SchedulerConfig,
    actor: String,
    interval: Duration,
    swings: u32,
) -> Result<(), Box<dyn Error>> {
    let (demo, _notes) = wire(config)?;
    let me = ActorRef::npc(actor.as_str());
    demo.store
        .save(Actor::new(me.clone(), 50).with_target(ActorRef::character("hero")))
        .await?;

    let count = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&count);
    let swing_actor = me.clone();
    demo.scheduler
        .battle()
        .start(me.clone(), interval, move || {
            let seen = Arc::clone(&seen);
            let swing_actor = swing_actor.clone();
            async move {
                let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
                println!("{swing_actor} swings ({n})");
                Ok::<(), ActionError>(())
            }
        })
        .await?;

    while count.load(Ordering::SeqCst) < swings {
        tokio::time::sleep(interval / 4).await;
    }
    demo.scheduler.battle().stop(&me.id).await?;
    info!(actor = %me, "stop_requested_target_still_set");

    tokio::time::sleep(interval * 2).await;
    demo.store.modify(&me, |a| a.target = None).await;
    info!(actor = %me, "target_cleared");

    while demo.scheduler.battle().is_running(&me.id).await {
        tokio::time::sleep(interval / 4).await;
    }
    println!("{}", serde_json::to_string(&demo.scheduler.status().await)?);

    demo.jobs.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SchedulerConfig::load(path)?,
        None => SchedulerConfig::default(),
    };
    init_tracing(&config.log_filter);

    match cli.command {
        Command::Poison {
            health,
            damage,
            interval_ms,
            duration_ms,
        } => {
            run_poison(
                config,
                health,
                damage,
                Duration::from_millis(interval_ms),
                Duration::from_millis(duration_ms),
            )
            .await
        }
        Command::Battle {
            actor,
            interval_ms,
            swings,
        } => run_battle(config, actor, Duration::from_millis(interval_ms), swings).await,
    }
}
