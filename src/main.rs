use std::sync::Arc;

use teloxide::prelude::*;

use desk_bot::audit::LogAudit;
use desk_bot::config::Config;
use desk_bot::context_store::{ContextStore, MemContextStore};
use desk_bot::dispatch::Engine;
use desk_bot::error::Error;
use desk_bot::flow::StateRegistry;
use desk_bot::flows::{self, Services};
use desk_bot::repository::MemRepository;
use desk_bot::request::{ServiceRequest, Technician};
use desk_bot::role_gate::{RoleGate, StaffDirectory};
use desk_bot::tg;

fn init_bot(config: &Config) -> Result<Bot, Error> {
    Ok(Bot::new(config.bot_token()?))
}

#[cfg(feature = "redis_db")]
async fn init_store(config: &Config) -> Result<Arc<dyn ContextStore>, Error> {
    match &config.redis_url {
        Some(url) => {
            log::info!("Conversations are kept in redis");
            let store = desk_bot::context_store::RedisContextStore::new(url).await?;
            Ok(Arc::new(store))
        },
        None => Ok(Arc::new(MemContextStore::new())),
    }
}

#[cfg(not(feature = "redis_db"))]
async fn init_store(config: &Config) -> Result<Arc<dyn ContextStore>, Error> {
    if config.redis_url.is_some() {
        log::warn!("redis_url is set but the redis_db feature is off, keeping conversations in memory");
    }
    Ok(Arc::new(MemContextStore::new()))
}

/// Drops conversations nobody touched for `idle_timeout`
async fn reaper(engine: Engine, config: Config) {
    let mut interval = tokio::time::interval(config.reaper_interval());
    loop {
        interval.tick().await;
        match engine.reap_idle(config.idle_timeout()).await {
            Ok(0) => (),
            Ok(n) => log::info!("reaper dropped {n} idle conversations"),
            Err(e) => log::warn!("reaper: {e}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting bot...");

    let config = Config::load()?;

    let requests: MemRepository<ServiceRequest> = MemRepository::new();
    let technicians: MemRepository<Technician> = MemRepository::seeded(config.technicians.clone())?;
    let services = Services {
        requests: Arc::new(requests),
        technicians: Arc::new(technicians),
        page_size: config.page_size,
    };

    let mut registry = StateRegistry::new();
    if let Err(e) = flows::register_all(&mut registry, &services) {
        log::error!("Broken flow definition: {e}");
        return Err(e.into())
    }
    log::info!("Flows: {}", registry.flow_names().collect::<Vec<_>>().join(", "));

    let staff = StaffDirectory::new(config.staff.clone());
    let gate = RoleGate::new(Arc::new(staff), config.role_ttl(), config.role_recheck());

    let store = init_store(&config).await?;
    let engine = Engine::new(Arc::new(registry), store, Arc::new(gate))
        .with_audit(Arc::new(LogAudit));
    tokio::spawn(reaper(engine.clone(), config.clone()));

    let bot = init_bot(&config)?.auto_send();

    Dispatcher::builder(bot, tg::schema())
        .dependencies(dptree::deps![engine])
        .build()
        .setup_ctrlc_handler()
        .dispatch()
        .await;

    Ok(())
}
