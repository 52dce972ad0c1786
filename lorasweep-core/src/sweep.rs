use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, SweepError};

// Absorbs float error in (stop - start) / step so that a stop value the
// sweep lands on exactly is still included.
const COUNT_TOLERANCE: f64 = 1e-9;

/// Largest number of jobs a single sweep may submit.
pub const MAX_SWEEP_JOBS: usize = 1000;

/// Smallest step that still gives a distinct weight at one-decimal
/// precision.
pub const MIN_STEP: f64 = 0.1;

/// An inclusive `start..=stop` range of LoRA weights walked in `step`
/// increments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSweep {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Default for WeightSweep {
    fn default() -> Self {
        Self {
            start: -0.1,
            stop: 1.0,
            step: 0.1,
        }
    }
}

impl WeightSweep {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    /// Rejects non-finite bounds, a step finer than [`MIN_STEP`] and a range
    /// that would yield more than [`MAX_SWEEP_JOBS`] weights. An empty range
    /// (`start > stop`) is not an error, it just yields no weights.
    pub fn validate(&self) -> Result<()> {
        let finite = self.start.is_finite() && self.stop.is_finite() && self.step.is_finite();
        if !finite {
            return Err(self.invalid("bounds and step must be finite"));
        }
        if self.step < MIN_STEP - COUNT_TOLERANCE {
            return Err(self.invalid("step must be at least 0.1"));
        }
        if self.start <= self.stop {
            let count = self.raw_count();
            if !count.is_finite() || count > MAX_SWEEP_JOBS as f64 {
                return Err(self.invalid("sweep would exceed 1000 jobs"));
            }
        }
        Ok(())
    }

    /// Number of weights the sweep yields, zero for an invalid or empty
    /// range.
    pub fn len(&self) -> usize {
        if self.validate().is_err() || self.start > self.stop {
            return 0;
        }
        // validate bounds the count to 1..=MAX_SWEEP_JOBS
        let count = self.raw_count() as u64;
        usize::try_from(count).map_or(0, |count| count.min(MAX_SWEEP_JOBS))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Weights in ascending order, each rounded to one decimal place.
    ///
    /// Every weight is computed as `start + i * step` rather than by
    /// repeated addition, so error does not accumulate along the sweep.
    pub fn weights(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| round_to_tenth(self.start + i as f64 * self.step))
    }

    pub fn tags(&self, name: &str) -> Vec<LoraTag> {
        self.weights()
            .map(|weight| LoraTag::new(name, weight))
            .collect()
    }
}

impl WeightSweep {
    fn raw_count(&self) -> f64 {
        ((self.stop - self.start) / self.step + COUNT_TOLERANCE).floor() + 1.0
    }

    fn invalid(&self, reason: &'static str) -> SweepError {
        SweepError::InvalidSweepRange {
            start: self.start,
            stop: self.stop,
            step: self.step,
            reason,
        }
    }
}

fn round_to_tenth(value: f64) -> f64 {
    let rounded = (value * 10.0).round() / 10.0;
    // -0.0 would print as "-0.0"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// A `<lora:name:weight>` prompt tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraTag {
    pub name: String,
    pub weight: f64,
}

impl LoraTag {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

impl fmt::Display for LoraTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<lora:{}:{:.1}>", self.name, self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn weights(start: f64, stop: f64, step: f64) -> Vec<f64> {
        WeightSweep::new(start, stop, step).weights().collect()
    }

    #[test]
    fn includes_both_ends() {
        assert_eq!(weights(-0.1, 0.2, 0.1), vec![-0.1, 0.0, 0.1, 0.2]);
    }

    #[test]
    fn default_ui_range_has_twelve_points() {
        let sweep = WeightSweep::new(-0.1, 1.0, 0.1);
        assert_eq!(sweep.len(), 12);
        let all: Vec<f64> = sweep.weights().collect();
        assert_eq!(all.first(), Some(&-0.1));
        assert_eq!(all.last(), Some(&1.0));
    }

    #[test]
    fn count_matches_range_over_step() {
        for &(start, stop, step) in &[(0.0, 1.0, 0.1), (0.0, 2.0, 0.5), (-1.0, 1.0, 0.2), (0.3, 0.3, 0.1)] {
            let expected = ((stop - start) / step + COUNT_TOLERANCE).floor() as usize + 1;
            assert_eq!(WeightSweep::new(start, stop, step).len(), expected);
        }
        assert_eq!(WeightSweep::new(0.0, 1.0, 0.3).len(), 4);
    }

    #[test]
    fn weights_strictly_increase() {
        let all = weights(-1.0, 1.0, 0.1);
        assert_eq!(all.len(), 21);
        assert!(all.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn long_sweep_does_not_drift() {
        let all = weights(0.0, 10.0, 0.1);
        assert_eq!(all.len(), 101);
        assert_eq!(all[73], 7.3);
        assert_eq!(all[100], 10.0);
    }

    #[test]
    fn degenerate_ranges_are_empty() {
        assert!(WeightSweep::new(0.0, 1.0, 0.0).is_empty());
        assert!(WeightSweep::new(0.0, 1.0, -0.1).is_empty());
        assert!(WeightSweep::new(1.0, 0.0, 0.1).is_empty());
        assert!(WeightSweep::new(0.0, 1.0, f64::NAN).is_empty());
    }

    #[test]
    fn validate_rejects_non_positive_step() {
        assert!(matches!(
            WeightSweep::new(0.0, 1.0, 0.0).validate(),
            Err(SweepError::InvalidSweepRange { .. })
        ));
        assert!(WeightSweep::new(0.0, 1.0, f64::INFINITY).validate().is_err());
        assert!(WeightSweep::new(1.0, 0.0, 0.1).validate().is_ok());
    }

    #[test]
    fn vanishing_step_is_rejected_without_overflow() {
        let sweep = WeightSweep::new(0.0, 1.0, 1e-300);
        assert!(matches!(
            sweep.validate(),
            Err(SweepError::InvalidSweepRange { .. })
        ));
        assert_eq!(sweep.len(), 0);
        assert_eq!(sweep.tags("x"), Vec::new());
    }

    #[test]
    fn huge_range_is_capped() {
        let sweep = WeightSweep::new(0.0, 1e12, 0.1);
        let err = sweep.validate().unwrap_err();
        assert!(err.to_string().contains("1000 jobs"), "{err}");
        assert_eq!(sweep.len(), 0);

        let overflowing = WeightSweep::new(-f64::MAX, f64::MAX, 1.0);
        assert!(overflowing.validate().is_err());
        assert_eq!(overflowing.len(), 0);
    }

    #[test]
    fn largest_allowed_sweep_is_accepted() {
        let sweep = WeightSweep::new(0.0, 99.9, 0.1);
        assert!(sweep.validate().is_ok());
        assert_eq!(sweep.len(), MAX_SWEEP_JOBS);
        assert!(WeightSweep::new(0.0, 100.0, 0.1).validate().is_err());
    }

    #[test]
    fn sub_tenth_step_is_rejected() {
        let sweep = WeightSweep::new(0.0, 0.3, 0.01);
        let err = sweep.validate().unwrap_err();
        assert!(err.to_string().contains("at least 0.1"), "{err}");
        assert!(sweep.is_empty());
    }

    #[test]
    fn allowed_steps_never_repeat_a_weight() {
        for &step in &[0.1, 0.15, 0.25, 0.3, 0.7] {
            let all = weights(-1.0, 3.0, step);
            assert!(
                all.windows(2).all(|pair| pair[0] < pair[1]),
                "step {step}: {all:?}"
            );
        }
    }

    #[test]
    fn tags_format_one_decimal() {
        let tags: Vec<String> = WeightSweep::new(-0.1, 0.2, 0.1)
            .tags("styleA")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            tags,
            vec![
                "<lora:styleA:-0.1>",
                "<lora:styleA:0.0>",
                "<lora:styleA:0.1>",
                "<lora:styleA:0.2>",
            ]
        );
    }

    #[test]
    fn whole_weights_keep_their_decimal() {
        assert_eq!(LoraTag::new("x", 1.0).to_string(), "<lora:x:1.0>");
    }
}
