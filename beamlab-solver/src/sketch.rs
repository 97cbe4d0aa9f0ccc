//! User-drawn beam sketch and its validation

use log::warn;
use serde::{Deserialize, Serialize};

use crate::analysis::PositionPolicy;
use crate::elements::Support;
use crate::error::{BeamError, BeamResult};
use crate::loads::Load;

/// A single-span beam with supports and loads, as drawn by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamSketch {
    /// Total span length in metres
    pub span: f64,
    /// Supports in placement order
    #[serde(default)]
    pub supports: Vec<Support>,
    /// Loads in placement order
    #[serde(default)]
    pub loads: Vec<Load>,
}

impl BeamSketch {
    /// Create an empty sketch of the given span
    pub fn new(span: f64) -> Self {
        Self {
            span,
            supports: Vec::new(),
            loads: Vec::new(),
        }
    }

    /// Add a support
    pub fn with_support(mut self, support: Support) -> Self {
        self.supports.push(support);
        self
    }

    /// Add a load
    pub fn with_load(mut self, load: impl Into<Load>) -> Self {
        self.loads.push(load.into());
        self
    }

    /// Sum of all applied downward forces
    pub fn total_applied_load(&self) -> f64 {
        self.loads.iter().map(Load::total_force).sum()
    }

    /// Validate the sketch and return a normalized snapshot
    ///
    /// Out-of-range positions are clamped or rejected according to `policy`.
    /// The returned snapshot is what every later stage works from.
    pub fn validate(&self, policy: PositionPolicy) -> BeamResult<BeamSketch> {
        if !self.span.is_finite() || self.span <= 0.0 {
            return Err(BeamError::InvalidSpan(self.span));
        }
        if self.supports.is_empty() {
            return Err(BeamError::NoSupports);
        }
        if self.loads.is_empty() {
            return Err(BeamError::NoLoads);
        }

        let span = self.span;
        let mut snapshot = BeamSketch::new(span);

        for (index, support) in self.supports.iter().enumerate() {
            if !support.position.is_finite() {
                return Err(BeamError::InvalidInput(format!(
                    "support #{index} has a non-finite position"
                )));
            }
            let position = fit_position(support.position, span, policy, || {
                format!("Support #{index}")
            })?;
            snapshot.supports.push(Support::new(position, support.kind));
        }

        for (index, load) in self.loads.iter().enumerate() {
            let invalid = |reason: &str| BeamError::InvalidLoad {
                index,
                reason: reason.to_string(),
            };

            let normalized = match *load {
                Load::Point(p) => {
                    if !p.magnitude.is_finite() || !p.position.is_finite() {
                        return Err(invalid("magnitude and position must be finite"));
                    }
                    let position =
                        fit_position(p.position, span, policy, || format!("Load #{index}"))?;
                    Load::point(position, p.magnitude)
                }
                Load::Distributed(d) => {
                    if !d.magnitude.is_finite() || !d.start.is_finite() || !d.end.is_finite() {
                        return Err(invalid("magnitude and extent must be finite"));
                    }
                    if d.start >= d.end {
                        return Err(invalid("distributed load start must be before its end"));
                    }
                    let start =
                        fit_position(d.start, span, policy, || format!("Load #{index} start"))?;
                    let end = fit_position(d.end, span, policy, || format!("Load #{index} end"))?;
                    Load::distributed(start, end, d.magnitude)
                }
            };
            snapshot.loads.push(normalized);
        }

        Ok(snapshot)
    }
}

fn fit_position(
    position: f64,
    span: f64,
    policy: PositionPolicy,
    what: impl Fn() -> String,
) -> BeamResult<f64> {
    if (0.0..=span).contains(&position) {
        return Ok(position);
    }
    match policy {
        PositionPolicy::Clamp => {
            let clamped = position.clamp(0.0, span);
            warn!("{} at {} clamped to {}", what(), position, clamped);
            Ok(clamped)
        }
        PositionPolicy::Reject => Err(BeamError::PositionOutOfRange {
            what: what(),
            position,
            span,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::SupportKind;

    fn simple() -> BeamSketch {
        BeamSketch::new(6.0)
            .with_support(Support::pinned(0.0))
            .with_support(Support::roller(6.0))
            .with_load(Load::point(3.0, 10.0))
    }

    #[test]
    fn test_valid_sketch_passes_unchanged() {
        let sketch = simple();
        assert_eq!(sketch.validate(PositionPolicy::Clamp).unwrap(), sketch);
    }

    #[test]
    fn test_rejects_bad_span() {
        let mut sketch = simple();
        sketch.span = 0.0;
        assert!(matches!(
            sketch.validate(PositionPolicy::Clamp),
            Err(BeamError::InvalidSpan(_))
        ));
        sketch.span = f64::NAN;
        assert!(sketch.validate(PositionPolicy::Clamp).is_err());
    }

    #[test]
    fn test_rejects_missing_supports_and_loads() {
        let no_supports = BeamSketch::new(6.0).with_load(Load::point(1.0, 1.0));
        assert!(matches!(
            no_supports.validate(PositionPolicy::Clamp),
            Err(BeamError::NoSupports)
        ));

        let no_loads = BeamSketch::new(6.0).with_support(Support::fixed(0.0));
        assert!(matches!(
            no_loads.validate(PositionPolicy::Clamp),
            Err(BeamError::NoLoads)
        ));
    }

    #[test]
    fn test_rejects_inverted_distributed_load() {
        let sketch = BeamSketch::new(6.0)
            .with_support(Support::fixed(0.0))
            .with_load(Load::distributed(4.0, 2.0, 5.0));
        assert!(matches!(
            sketch.validate(PositionPolicy::Clamp),
            Err(BeamError::InvalidLoad { index: 0, .. })
        ));
    }

    #[test]
    fn test_clamps_out_of_range_positions() {
        let sketch = BeamSketch::new(6.0)
            .with_support(Support::new(-0.5, SupportKind::Pinned))
            .with_support(Support::roller(6.0))
            .with_load(Load::point(7.5, 10.0))
            .with_load(Load::distributed(-1.0, 8.0, 2.0));

        let snapshot = sketch.validate(PositionPolicy::Clamp).unwrap();
        assert_eq!(snapshot.supports[0].position, 0.0);
        assert_eq!(snapshot.loads[0], Load::point(6.0, 10.0));
        assert_eq!(snapshot.loads[1], Load::distributed(0.0, 6.0, 2.0));
    }

    #[test]
    fn test_reject_policy_surfaces_out_of_range() {
        let sketch = simple().with_load(Load::point(6.01, 1.0));
        let err = sketch.validate(PositionPolicy::Reject).unwrap_err();
        assert!(matches!(err, BeamError::PositionOutOfRange { .. }));
        assert!(err.is_validation());
    }
}
