//! Bounded random field producers for synthesized events.

use rand::Rng;

use crate::events::EquipmentKind;

pub const PRIME_RATE_MIN: f64 = 4.0;
pub const PRIME_RATE_MAX: f64 = 16.0;

pub const MACHINE_FAILURE_MAX: u32 = 10;
pub const TRUCK_FAILURE_MAX: u32 = 5;

/// Round half away from zero to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Map a unit draw `u` in `[0, 1]` onto the prime-rate band.
///
/// `u = 0.0` yields exactly 4.00 and `u = 1.0` exactly 16.00; out-of-range
/// inputs are clamped.
pub fn prime_rate_from_unit(u: f64) -> f64 {
    let u = if u.is_nan() { 0.0 } else { u.clamp(0.0, 1.0) };
    round2(PRIME_RATE_MIN + u * (PRIME_RATE_MAX - PRIME_RATE_MIN)).clamp(PRIME_RATE_MIN, PRIME_RATE_MAX)
}

pub fn prime_rate<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    prime_rate_from_unit(rng.gen_range(0.0..=1.0))
}

pub fn failure_quantity_max(kind: EquipmentKind) -> u32 {
    match kind {
        EquipmentKind::Machine => MACHINE_FAILURE_MAX,
        EquipmentKind::Truck => TRUCK_FAILURE_MAX,
    }
}

pub fn failure_quantity<R: Rng + ?Sized>(rng: &mut R, kind: EquipmentKind) -> u32 {
    rng.gen_range(1..=failure_quantity_max(kind))
}
