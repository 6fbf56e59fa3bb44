use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tokio::time::{sleep, Duration};

use sim_notifier::config::Config;
use sim_notifier::logging::{log, obj, v_str, Domain, Level};
use sim_notifier::market::StaticMarket;
use sim_notifier::scheduler::Scheduler;
use sim_notifier::state::{GuardedState, SimStatus, SimulationState};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;
    let market = match &cfg.market_file {
        Some(path) => StaticMarket::from_file(path)?,
        None => StaticMarket::default(),
    };
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("market", v_str(if cfg.market_file.is_some() { "file" } else { "empty" })),
            ("machine_subscribers", json!(cfg.machine_failure_urls.len())),
            ("truck_subscribers", json!(cfg.truck_failure_urls.len())),
            ("rate_subscribers", json!(cfg.rate_update_urls.len())),
            ("epoch_subscribers", json!(cfg.epoch_urls.len())),
            ("sim_days", json!(cfg.sim_days)),
        ]),
    );

    let day_length = Duration::from_millis(cfg.sim_day_ms);
    let sim_days = cfg.sim_days;
    let state = GuardedState::new(SimulationState::new(Utc::now().timestamp_millis()));
    let mut scheduler = Scheduler::new(cfg, market);

    state
        .update(|s| SimulationState { status: SimStatus::Running, ..s.clone() })
        .await;
    scheduler.announce_epoch(&state).await;

    let mut delivered = 0usize;
    let mut failed = 0usize;
    for day in 0..=sim_days {
        if day > 0 {
            sleep(day_length).await;
            state
                .update(|s| SimulationState { current_day: day, ..s.clone() })
                .await;
        }
        let report = scheduler.on_day_advanced(&state).await;
        delivered += report.rounds.iter().map(|r| r.delivered()).sum::<usize>();
        failed += report.rounds.iter().map(|r| r.failed()).sum::<usize>();
    }

    state
        .update(|s| SimulationState { status: SimStatus::Completed, ..s.clone() })
        .await;
    log(
        Level::Info,
        Domain::System,
        "shutdown",
        obj(&[
            ("days", json!(sim_days)),
            ("delivered", json!(delivered)),
            ("failed", json!(failed)),
        ]),
    );
    Ok(())
}
