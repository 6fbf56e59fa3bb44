//! Periodic business-event scheduler and notification fan-out for a
//! simulated economy.
//!
//! The simulation driver advances the day counter and calls
//! [`scheduler::Scheduler::on_day_advanced`] once per distinct day. The
//! scheduler decides which event categories are due, synthesizes payloads
//! from live market data and fans each one out to its subscribers.

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod failure;
pub mod logging;
pub mod market;
pub mod random;
pub mod scheduler;
pub mod state;
