//! Power fraction to PWM duty cycle conversion
//!
//! Small fans stall below roughly a fifth of full duty, so any non-zero power
//! is mapped into the `[MIN_POWERED_DUTY_CYCLE, MAX_POWERED_DUTY_CYCLE]` band
//! and only an exact zero switches the fan off.

/// PWM carrier period in milliseconds
pub const PWM_PERIOD_MS: u64 = 200;

/// Duty cycle (percent) of a fan that is switched off
pub const OFF_DUTY_CYCLE: f64 = 0.0;

/// Lowest duty cycle (percent) at which the fan reliably spins
pub const MIN_POWERED_DUTY_CYCLE: f64 = 20.0;

/// Duty cycle (percent) at full power
pub const MAX_POWERED_DUTY_CYCLE: f64 = 100.0;

/// Convert a power fraction to a duty cycle percentage.
///
/// - 0.0 → 0%
/// - 0.3 → 44%
/// - 1.0 → 100%
///
/// Values outside `[0.0, 1.0]` are clamped first, so the result always lies
/// in `{0} ∪ [20, 100]`.
pub fn duty_cycle_for_power(power: f64) -> f64 {
    let power = power.clamp(0.0, 1.0);
    if power == 0.0 {
        OFF_DUTY_CYCLE
    } else {
        MIN_POWERED_DUTY_CYCLE + power * (MAX_POWERED_DUTY_CYCLE - MIN_POWERED_DUTY_CYCLE)
    }
}

/// Check that `power` is a usable power fraction.
pub fn validate_power(power: f64) -> Result<(), String> {
    if !power.is_finite() || !(0.0..=1.0).contains(&power) {
        return Err(format!(
            "Power fraction {} is outside valid range (0.0 to 1.0)",
            power
        ));
    }
    Ok(())
}
