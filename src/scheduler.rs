//! Day-driven event scheduler.
//!
//! Called once per day advance by the simulation driver. Each call looks only
//! at the day it is handed: there is no memory of previous calls, so calling
//! twice for the same day fires the same rounds twice.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use crate::clock::SimCalendar;
use crate::config::Config;
use crate::dispatch::{CredentialPolicy, Dispatcher, RoundReport};
use crate::events::{Category, EpochEvent, EquipmentKind, RateUpdateEvent};
use crate::failure::{BuildSkip, FailureEventBuilder};
use crate::logging::{log, log_skip, log_trigger, obj, v_str, Domain, Level};
use crate::market::{index_catalog, CatalogProvider, MarketProvider};
use crate::random::prime_rate;
use crate::state::{GuardedState, SimulationState};

/// `day mod period == 0`. Day 0 is due for every period.
pub fn is_due(day: u64, period: u64) -> bool {
    period != 0 && day % period == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triggers {
    pub failures: bool,
    pub rate_update: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub day: u64,
    pub triggers: Triggers,
    pub rounds: Vec<RoundReport>,
}

impl TickReport {
    pub fn round(&self, category: Category) -> Option<&RoundReport> {
        self.rounds.iter().find(|r| r.category == category)
    }
}

pub struct Scheduler<M> {
    cfg: Config,
    market: M,
    calendar: SimCalendar,
    rng: StdRng,
}

impl<M> Scheduler<M>
where
    M: MarketProvider + CatalogProvider + Send + Sync,
{
    pub fn new(cfg: Config, market: M) -> Self {
        let rng = match cfg.sim_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let calendar = SimCalendar::new(cfg.sim_start_date, cfg.sim_day_ms);
        Self { cfg, market, calendar, rng }
    }

    pub fn triggers(&self, day: u64) -> Triggers {
        Triggers {
            failures: is_due(day, self.cfg.failure_period_days),
            rate_update: is_due(day, self.cfg.rate_period_days),
        }
    }

    /// Evaluate both periods for the current day and run every due round.
    /// Failures are logged and reported, never returned as errors.
    pub async fn on_day_advanced(&mut self, state: &GuardedState<SimulationState>) -> TickReport {
        // One read per invocation; every decision below sees the same day.
        let snap = state.snapshot().await;
        let day = snap.current_day;
        let triggers = self.triggers(day);
        log(
            Level::Debug,
            Domain::Scheduler,
            "tick",
            obj(&[
                ("day", json!(day)),
                ("failures_due", json!(triggers.failures)),
                ("rate_due", json!(triggers.rate_update)),
            ]),
        );

        let mut rounds = Vec::new();
        if triggers.failures {
            let date = self.calendar.date_string(&snap);
            let time = self.calendar.current_time_string(&snap);
            for kind in [EquipmentKind::Machine, EquipmentKind::Truck] {
                log_trigger(day, Category::for_failure(kind).as_str(), self.cfg.failure_period_days);
                rounds.push(self.failure_round(kind, &date, &time).await);
            }
        }
        if triggers.rate_update {
            log_trigger(day, Category::RateUpdate.as_str(), self.cfg.rate_period_days);
            rounds.push(self.rate_round(&snap).await);
        }

        TickReport { day, triggers, rounds }
    }

    /// On-demand rate announcement, outside the periodic trigger.
    pub async fn announce_prime_rate(&mut self, state: &GuardedState<SimulationState>) -> RoundReport {
        let snap = state.snapshot().await;
        self.rate_round(&snap).await
    }

    /// Tell epoch subscribers when simulated day 0 began. Falls back to plain
    /// delivery if the epoch credentials cannot be loaded.
    pub async fn announce_epoch(&self, state: &GuardedState<SimulationState>) -> RoundReport {
        let epoch_start_time = state.read(|s| self.calendar.epoch_start(s)).await;
        let category = Category::Epoch;
        let Some(dispatcher) =
            Dispatcher::for_round(category, self.cfg.epoch_tls.as_ref(), CredentialPolicy::FallbackToPlain)
        else {
            return RoundReport::aborted(category, "no http client");
        };
        let payload = json!(EpochEvent { epoch_start_time });
        dispatcher.broadcast(category, &self.cfg.epoch_urls, &payload).await
    }

    async fn failure_round(&mut self, kind: EquipmentKind, date: &str, time: &str) -> RoundReport {
        let category = Category::for_failure(kind);
        let targets = match kind {
            EquipmentKind::Machine => &self.cfg.machine_failure_urls,
            EquipmentKind::Truck => &self.cfg.truck_failure_urls,
        };
        if targets.is_empty() {
            log_skip(Domain::Dispatch, category.as_str(), None, "no subscribers configured");
            return RoundReport::aborted(category, "no subscribers configured");
        }

        let snapshot = match self.market.for_sale(kind).await {
            Ok(s) => s,
            Err(err) => {
                let reason = format!("market snapshot unavailable: {:#}", err);
                log_skip(Domain::Market, category.as_str(), None, &reason);
                return RoundReport::aborted(category, reason);
            }
        };
        if snapshot.is_empty() {
            let reason = BuildSkip::NoUnsoldEquipment.to_string();
            log_skip(Domain::Market, category.as_str(), None, &reason);
            return RoundReport::aborted(category, reason);
        }
        let catalog = match self.market.catalog(kind).await {
            Ok(entries) => index_catalog(entries),
            Err(err) => {
                let reason = format!("catalog unavailable: {:#}", err);
                log_skip(Domain::Market, category.as_str(), None, &reason);
                return RoundReport::aborted(category, reason);
            }
        };

        let Some(dispatcher) = Dispatcher::for_round(category, None, CredentialPolicy::AbortRound) else {
            return RoundReport::aborted(category, "no http client");
        };
        let builder = FailureEventBuilder {
            kind,
            snapshot: &snapshot,
            catalog: &catalog,
            simulation_date: date,
            simulation_time: time,
        };
        let rng = &mut self.rng;
        // Separate draw per subscriber: each may hear about a different item.
        dispatcher
            .fan_out(category, targets, |_| {
                builder.build(&mut *rng).map(|ev| ev.to_json()).map_err(|skip| skip.to_string())
            })
            .await
    }

    async fn rate_round(&mut self, snap: &SimulationState) -> RoundReport {
        let category = Category::RateUpdate;
        let Some(dispatcher) =
            Dispatcher::for_round(category, self.cfg.rate_tls.as_ref(), CredentialPolicy::AbortRound)
        else {
            return RoundReport::aborted(category, "rate-update credentials unavailable");
        };
        let event = RateUpdateEvent {
            prime_rate: prime_rate(&mut self.rng),
            simulation_date: self.calendar.date_string(snap),
            simulation_time: self.calendar.current_time_string(snap),
        };
        log(
            Level::Info,
            Domain::Scheduler,
            "prime_rate",
            obj(&[
                ("category", v_str(category.as_str())),
                ("prime_rate", json!(event.prime_rate)),
                ("simulation_date", v_str(&event.simulation_date)),
            ]),
        );
        dispatcher.broadcast(category, &self.cfg.rate_update_urls, &json!(event)).await
    }
}
