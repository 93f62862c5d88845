//! Temperature rules - the piecewise-linear temperature-to-power curve
//!
//! Stored as `[[rules]]` tables in `config.toml`.
//!
//! Each rule covers the half-open interval `[min_temp, max_temp)` and maps it
//! linearly onto `[min_power, max_power]`. A missing bound means the rule is
//! unbounded in that direction.

use serde::{Deserialize, Serialize};

/// One segment of the temperature-to-power mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRangeRule {
    /// Inclusive lower bound in Celsius, `None` for unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_temp: Option<f64>,
    /// Exclusive upper bound in Celsius, `None` for unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_temp: Option<f64>,
    /// Power fraction at `min_temp`
    pub min_power: f64,
    /// Power fraction approached at `max_temp`
    pub max_power: f64,
}

impl TemperatureRangeRule {
    /// Create a new rule.
    pub fn new(
        min_temp: Option<f64>,
        max_temp: Option<f64>,
        min_power: f64,
        max_power: f64,
    ) -> Self {
        Self {
            min_temp,
            max_temp,
            min_power,
            max_power,
        }
    }

    /// Whether `temp` falls inside `[min_temp, max_temp)`.
    ///
    /// NaN is never contained, not even by a rule unbounded on both sides.
    pub fn contains(&self, temp: f64) -> bool {
        if temp.is_nan() {
            return false;
        }
        self.min_temp.map_or(true, |min| temp >= min) && self.max_temp.map_or(true, |max| temp < max)
    }

    /// Power fraction for a temperature inside this rule.
    ///
    /// Bounded rules interpolate linearly. A half-open rule holds the power of
    /// its finite edge, which keeps the curve continuous at the join with the
    /// neighbouring rule. A rule unbounded on both sides yields `max_power`.
    pub fn power_at(&self, temp: f64) -> f64 {
        match (self.min_temp, self.max_temp) {
            (Some(min), Some(max)) => {
                let scale = (temp - min) / (max - min);
                self.min_power + scale * (self.max_power - self.min_power)
            }
            (None, Some(_)) => self.max_power,
            (Some(_), None) => self.min_power,
            (None, None) => self.max_power,
        }
    }
}

/// Ordered, contiguous sequence of temperature rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemperatureCurve {
    rules: Vec<TemperatureRangeRule>,
}

impl Default for TemperatureCurve {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TemperatureCurve {
    /// Create a curve from rules, in ascending temperature order.
    pub fn new(rules: Vec<TemperatureRangeRule>) -> Self {
        Self { rules }
    }

    /// Curve tuned for a Raspberry Pi CPU: off below 38°C, full power from 55°C.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            TemperatureRangeRule::new(None, Some(38.0), 0.0, 0.0),
            TemperatureRangeRule::new(Some(38.0), Some(45.0), 0.0, 0.7),
            TemperatureRangeRule::new(Some(45.0), Some(55.0), 0.7, 1.0),
            TemperatureRangeRule::new(Some(55.0), None, 1.0, 1.0),
        ])
    }

    /// The rules, in order.
    pub fn rules(&self) -> &[TemperatureRangeRule] {
        &self.rules
    }

    /// First rule whose interval contains `temp`.
    pub fn rule_for(&self, temp: f64) -> Option<&TemperatureRangeRule> {
        self.rules.iter().find(|rule| rule.contains(temp))
    }

    /// Power fraction for `temp`, or `None` when no rule matches.
    ///
    /// On a validated curve only NaN is unmatched.
    pub fn power_for(&self, temp: f64) -> Option<f64> {
        self.rule_for(temp).map(|rule| rule.power_at(temp))
    }

    /// Validate the curve.
    ///
    /// Rules must cover the whole real line exactly once: the first rule is
    /// unbounded below, the last unbounded above, and every rule ends where
    /// the next one begins.
    pub fn validate(&self) -> Result<(), String> {
        let (first, last) = match (self.rules.first(), self.rules.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err("Temperature curve must have at least 1 rule".to_string()),
        };

        if let Some(min) = first.min_temp {
            return Err(format!(
                "First rule must be unbounded below, found min_temp = {}",
                min
            ));
        }
        if let Some(max) = last.max_temp {
            return Err(format!(
                "Last rule must be unbounded above, found max_temp = {}",
                max
            ));
        }

        for (idx, rule) in self.rules.iter().enumerate() {
            for power in [rule.min_power, rule.max_power] {
                if !(0.0..=1.0).contains(&power) {
                    return Err(format!(
                        "Rule {}: power {} is outside valid range (0.0 to 1.0)",
                        idx, power
                    ));
                }
            }

            for bound in [rule.min_temp, rule.max_temp].into_iter().flatten() {
                if !bound.is_finite() {
                    return Err(format!("Rule {}: temperature bound must be finite", idx));
                }
            }

            if idx > 0 && rule.min_temp.is_none() {
                return Err(format!("Rule {}: only the first rule may be unbounded below", idx));
            }
            if idx + 1 < self.rules.len() && rule.max_temp.is_none() {
                return Err(format!("Rule {}: only the last rule may be unbounded above", idx));
            }

            if let (Some(min), Some(max)) = (rule.min_temp, rule.max_temp) {
                if min >= max {
                    return Err(format!(
                        "Rule {}: min_temp {} must be below max_temp {}",
                        idx, min, max
                    ));
                }
            }
        }

        for (idx, window) in self.rules.windows(2).enumerate() {
            if window[0].max_temp != window[1].min_temp {
                return Err(format!(
                    "Rules {} and {} are not contiguous: {:?} != {:?}",
                    idx,
                    idx + 1,
                    window[0].max_temp,
                    window[1].min_temp
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rule_contains_half_open() {
        let rule = TemperatureRangeRule::new(Some(38.0), Some(45.0), 0.0, 0.7);
        assert!(rule.contains(38.0));
        assert!(rule.contains(44.999));
        assert!(!rule.contains(45.0));
        assert!(!rule.contains(37.9));
        assert!(!rule.contains(f64::NAN));
    }

    #[test]
    fn test_unbounded_rule_contains() {
        let below = TemperatureRangeRule::new(None, Some(38.0), 0.0, 0.0);
        assert!(below.contains(-273.0));
        assert!(!below.contains(38.0));

        let above = TemperatureRangeRule::new(Some(55.0), None, 1.0, 1.0);
        assert!(above.contains(55.0));
        assert!(above.contains(1000.0));

        let everything = TemperatureRangeRule::new(None, None, 0.5, 0.5);
        assert!(everything.contains(0.0));
        assert!(!everything.contains(f64::NAN));
    }

    #[test]
    fn test_interpolation_inside_rule() {
        let rule = TemperatureRangeRule::new(Some(45.0), Some(55.0), 0.7, 1.0);

        // Lower bound gives min_power exactly
        assert_eq!(rule.power_at(45.0), 0.7);
        // Midpoint
        assert!(approx(rule.power_at(50.0), 0.85));
        // Approaching the upper bound approaches max_power
        assert!((rule.power_at(54.9999) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_half_open_rules_hold_edge_power() {
        let below = TemperatureRangeRule::new(None, Some(38.0), 0.1, 0.2);
        assert_eq!(below.power_at(-10.0), 0.2);

        let above = TemperatureRangeRule::new(Some(55.0), None, 0.9, 1.0);
        assert_eq!(above.power_at(90.0), 0.9);

        let everything = TemperatureRangeRule::new(None, None, 0.3, 0.6);
        assert_eq!(everything.power_at(20.0), 0.6);
    }

    #[test]
    fn test_default_curve_scenarios() {
        let curve = TemperatureCurve::with_defaults();

        let power = curve.power_for(41.0).unwrap();
        assert!(approx(power, 0.3));

        assert_eq!(curve.power_for(60.0), Some(1.0));
        assert_eq!(curve.power_for(30.0), Some(0.0));
        assert_eq!(curve.power_for(38.0), Some(0.0));
        assert_eq!(curve.power_for(45.0), Some(0.7));
        assert_eq!(curve.power_for(55.0), Some(1.0));
    }

    #[test]
    fn test_power_for_nan_is_unmatched() {
        let curve = TemperatureCurve::with_defaults();
        assert!(curve.power_for(f64::NAN).is_none());
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let curve = TemperatureCurve::new(vec![
            TemperatureRangeRule::new(None, Some(50.0), 0.2, 0.2),
            TemperatureRangeRule::new(None, Some(60.0), 0.8, 0.8),
        ]);
        assert_eq!(curve.power_for(40.0), Some(0.2));
        assert_eq!(curve.power_for(55.0), Some(0.8));
        assert!(curve.power_for(70.0).is_none());
    }

    #[test]
    fn test_validation_default_curve() {
        assert!(TemperatureCurve::with_defaults().validate().is_ok());
    }

    #[test]
    fn test_validation_single_rule() {
        let curve = TemperatureCurve::new(vec![TemperatureRangeRule::new(None, None, 0.5, 0.5)]);
        assert!(curve.validate().is_ok());
    }

    #[test]
    fn test_validation_empty() {
        let result = TemperatureCurve::new(vec![]).validate();
        assert!(result.unwrap_err().contains("at least 1 rule"));
    }

    #[test]
    fn test_validation_bounded_ends() {
        let curve = TemperatureCurve::new(vec![
            TemperatureRangeRule::new(Some(20.0), Some(40.0), 0.0, 0.5),
            TemperatureRangeRule::new(Some(40.0), None, 0.5, 1.0),
        ]);
        assert!(curve.validate().unwrap_err().contains("unbounded below"));

        let curve = TemperatureCurve::new(vec![
            TemperatureRangeRule::new(None, Some(40.0), 0.0, 0.5),
            TemperatureRangeRule::new(Some(40.0), Some(80.0), 0.5, 1.0),
        ]);
        assert!(curve.validate().unwrap_err().contains("unbounded above"));
    }

    #[test]
    fn test_validation_gap() {
        let curve = TemperatureCurve::new(vec![
            TemperatureRangeRule::new(None, Some(38.0), 0.0, 0.0),
            TemperatureRangeRule::new(Some(40.0), None, 0.5, 1.0),
        ]);
        assert!(curve.validate().unwrap_err().contains("not contiguous"));
    }

    #[test]
    fn test_validation_overlap() {
        let curve = TemperatureCurve::new(vec![
            TemperatureRangeRule::new(None, Some(45.0), 0.0, 0.5),
            TemperatureRangeRule::new(Some(40.0), None, 0.5, 1.0),
        ]);
        assert!(curve.validate().unwrap_err().contains("not contiguous"));
    }

    #[test]
    fn test_validation_inverted_bounds() {
        let curve = TemperatureCurve::new(vec![
            TemperatureRangeRule::new(None, Some(50.0), 0.0, 0.0),
            TemperatureRangeRule::new(Some(50.0), Some(40.0), 0.0, 0.5),
            TemperatureRangeRule::new(Some(40.0), None, 1.0, 1.0),
        ]);
        assert!(curve.validate().unwrap_err().contains("must be below"));
    }

    #[test]
    fn test_validation_interior_unbounded() {
        let curve = TemperatureCurve::new(vec![
            TemperatureRangeRule::new(None, None, 0.0, 0.0),
            TemperatureRangeRule::new(None, None, 1.0, 1.0),
        ]);
        assert!(curve.validate().unwrap_err().contains("only the"));
    }

    #[test]
    fn test_validation_power_out_of_range() {
        let curve = TemperatureCurve::new(vec![
            TemperatureRangeRule::new(None, Some(40.0), 0.0, 1.5),
            TemperatureRangeRule::new(Some(40.0), None, 1.0, 1.0),
        ]);
        assert!(curve.validate().unwrap_err().contains("outside valid range"));
    }

    #[test]
    fn test_validation_non_finite_bound() {
        let curve = TemperatureCurve::new(vec![
            TemperatureRangeRule::new(None, Some(f64::INFINITY), 0.0, 0.0),
            TemperatureRangeRule::new(Some(f64::INFINITY), None, 1.0, 1.0),
        ]);
        assert!(curve.validate().unwrap_err().contains("finite"));
    }
}
