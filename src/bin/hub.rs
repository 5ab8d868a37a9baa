use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nvr_monitoring::{
    adapters::factory::Brand,
    alarm::AlarmEngine,
    collector::Collector,
    config::{Config, DeviceConfig, read_config_file},
    events::EventBus,
    scheduler::SchedulerHandle,
    store::{
        MemoryStore, PlainCredentials,
        schema::{Device, DeviceState},
    },
};
use tracing::{debug, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("nvr_monitoring", LevelFilter::TRACE),
        ("nvrmon_hub", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let store = Arc::new(MemoryStore::new());
    seed_devices(&store, &config).await?;

    let bus = Arc::new(EventBus::default());
    let cipher = Arc::new(PlainCredentials);

    let collector = Arc::new(Collector::new(
        store.clone(),
        cipher,
        bus.clone(),
        config.schedule.probe_timeout(),
    ));
    let engine = Arc::new(AlarmEngine::new(store.clone(), bus));

    let scheduler = SchedulerHandle::spawn(collector, engine, config.schedule.clone());

    info!("hub running, {} devices registered", store.device_count().await);

    tokio::signal::ctrl_c().await?;
    debug!("interrupt received, shutting down");

    scheduler.shutdown().await;
    // Give in-flight probes a moment to finish; nothing partial is written
    // if they are abandoned instead.
    tokio::time::sleep(Duration::from_millis(200)).await;

    Ok(())
}

async fn seed_devices(store: &MemoryStore, config: &Config) -> anyhow::Result<()> {
    let Some(devices) = &config.devices else {
        return Ok(());
    };

    for device in devices {
        let DeviceConfig {
            id,
            name,
            brand,
            ip,
            port,
            username,
            password,
            channel_count,
        } = device.clone();

        let brand = Brand::parse(&brand)?;

        store
            .add_device(Device {
                id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                name,
                brand,
                ip,
                port,
                username,
                password,
                channel_count,
                state: DeviceState::Active,
                company_id: None,
                online: false,
                last_online_at: None,
                last_offline_at: None,
                disk_usage_rate: 0.0,
            })
            .await;
    }

    Ok(())
}
