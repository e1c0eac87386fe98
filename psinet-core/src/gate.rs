//! # Gate - Activation Outlet of a Node
//!
//! A gate turns the input handed to it by its node function into an
//! activation, then that activation fans out along every outgoing link
//! during the next Propagate phase.
//!
//! ## Gate Function
//!
//! ```text
//! factor == 0            -> 0 (closed gate, no decay either)
//! raw = max(input, threshold) * amplification * factor
//! decay != 0, raw <  0   -> raw = min(raw, previous * (1 - decay))
//! decay != 0, raw >= 0   -> raw = max(raw, previous * (1 - decay))
//! activation = clamp(raw, minimum, maximum)
//! ```
//!
//! Threshold is a floor applied before amplification, and decay only ever
//! slows the approach toward zero.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NetError, NetResult};
use crate::id::LinkId;

/// Names of the tunable gate parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateParameter {
    Minimum,
    Maximum,
    Certainty,
    Amplification,
    Threshold,
    Decay,
}

impl GateParameter {
    pub const ALL: [GateParameter; 6] = [
        GateParameter::Minimum,
        GateParameter::Maximum,
        GateParameter::Certainty,
        GateParameter::Amplification,
        GateParameter::Threshold,
        GateParameter::Decay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GateParameter::Minimum => "minimum",
            GateParameter::Maximum => "maximum",
            GateParameter::Certainty => "certainty",
            GateParameter::Amplification => "amplification",
            GateParameter::Threshold => "threshold",
            GateParameter::Decay => "decay",
        }
    }
}

impl FromStr for GateParameter {
    type Err = NetError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        GateParameter::ALL
            .into_iter()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| NetError::UnknownParameter(name.to_string()))
    }
}

impl fmt::Display for GateParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter set of a gate function
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateParameters {
    /// Lower clamp of the activation
    pub minimum: f64,

    /// Upper clamp of the activation
    pub maximum: f64,

    /// Stored for node functions that want it; the gate function ignores it
    pub certainty: f64,

    /// Linear gain
    pub amplification: f64,

    /// Floor applied to the input before amplification
    pub threshold: f64,

    /// Fraction of the previous activation lost per step (0 = no decay floor)
    pub decay: f64,
}

impl Default for GateParameters {
    fn default() -> Self {
        Self {
            minimum: -1.0,
            maximum: 1.0,
            certainty: 1.0,
            amplification: 1.0,
            threshold: 0.0,
            decay: 0.0,
        }
    }
}

impl GateParameters {
    pub fn get(&self, param: GateParameter) -> f64 {
        match param {
            GateParameter::Minimum => self.minimum,
            GateParameter::Maximum => self.maximum,
            GateParameter::Certainty => self.certainty,
            GateParameter::Amplification => self.amplification,
            GateParameter::Threshold => self.threshold,
            GateParameter::Decay => self.decay,
        }
    }

    /// Return a copy with `param` set to `value`, or an error if the result
    /// would not be a usable parameter set.
    pub fn with(&self, param: GateParameter, value: f64) -> NetResult<Self> {
        let mut next = *self;
        match param {
            GateParameter::Minimum => next.minimum = value,
            GateParameter::Maximum => next.maximum = value,
            GateParameter::Certainty => next.certainty = value,
            GateParameter::Amplification => next.amplification = value,
            GateParameter::Threshold => next.threshold = value,
            GateParameter::Decay => next.decay = value,
        }
        next.validate().map_err(|reason| NetError::InvalidParameter {
            name: param.to_string(),
            value,
            reason,
        })?;
        Ok(next)
    }

    /// Check the whole set; returns a reason on failure
    pub fn validate(&self) -> Result<(), String> {
        for param in GateParameter::ALL {
            if !self.get(param).is_finite() {
                return Err(format!("{} must be finite", param));
            }
        }
        if self.minimum > self.maximum {
            return Err(format!(
                "minimum {} exceeds maximum {}",
                self.minimum, self.maximum
            ));
        }
        if !(0.0..=1.0).contains(&self.decay) {
            return Err("decay must lie in [0, 1]".to_string());
        }
        Ok(())
    }
}

/// Compute a gate's new activation.
///
/// Pure in all of its arguments. `gate_factor` is the activator value of the
/// owning nodespace for this gate type (1.0 when none is set).
pub fn gate_function(
    input: f64,
    previous: f64,
    params: &GateParameters,
    gate_factor: f64,
) -> f64 {
    if gate_factor == 0.0 {
        return 0.0;
    }

    let input = if input.is_finite() { input } else { 0.0 };
    let mut activation = input.max(params.threshold) * params.amplification * gate_factor;

    if params.decay != 0.0 {
        let floor = previous * (1.0 - params.decay);
        if activation < 0.0 {
            activation = activation.min(floor);
        } else {
            activation = activation.max(floor);
        }
    }

    let activation = activation.max(params.minimum).min(params.maximum);
    if activation.is_finite() {
        activation
    } else {
        0.0
    }
}

/// Activation outlet of a node
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Gate {
    /// Gate type name (e.g. "gen", "sub")
    pub gate_type: String,

    /// Current activation; what the next Propagate phase sends out
    pub activation: f64,

    /// Gate function parameters
    pub params: GateParameters,

    /// Links leaving this gate
    pub outgoing: BTreeSet<LinkId>,
}

impl Gate {
    /// Gate at rest: activation 0, moved into range if the range excludes it
    pub fn new(gate_type: impl Into<String>, params: GateParameters) -> Self {
        Self {
            gate_type: gate_type.into(),
            activation: 0.0_f64.max(params.minimum).min(params.maximum),
            params,
            outgoing: BTreeSet::new(),
        }
    }

    /// Run the gate function against this gate's own state
    pub fn compute(&self, input: f64, gate_factor: f64) -> f64 {
        gate_function(input, self.activation, &self.params, gate_factor)
    }

    /// Place `value` inside the gate's range
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.params.minimum).min(self.params.maximum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_passthrough() {
        let params = GateParameters::default();
        assert_eq!(gate_function(0.5, 0.0, &params, 1.0), 0.5);
        assert_eq!(gate_function(3.0, 0.0, &params, 1.0), 1.0);
    }

    #[test]
    fn test_threshold_is_floor_before_amplification() {
        let params = GateParameters {
            threshold: 0.25,
            amplification: 2.0,
            maximum: 10.0,
            ..Default::default()
        };
        // max(0.1, 0.25) * 2
        assert_eq!(gate_function(0.1, 0.0, &params, 1.0), 0.5);
        // Default threshold 0 cuts negative input
        assert_eq!(gate_function(-0.7, 0.0, &GateParameters::default(), 1.0), 0.0);
    }

    #[test]
    fn test_closed_gate_suppresses_decay() {
        let params = GateParameters {
            decay: 0.1,
            ..Default::default()
        };
        assert_eq!(gate_function(1.0, 0.9, &params, 0.0), 0.0);
    }

    #[test]
    fn test_decay_floor() {
        let params = GateParameters {
            decay: 0.5,
            threshold: -1.0,
            ..Default::default()
        };
        // Positive side: previous 0.8 keeps at least 0.4
        assert_eq!(gate_function(0.0, 0.8, &params, 1.0), 0.4);
        // Larger input wins
        assert_eq!(gate_function(0.6, 0.8, &params, 1.0), 0.6);
        // Negative side keeps at most -0.4
        assert_eq!(gate_function(-0.1, -0.8, &params, 1.0), -0.4);
    }

    #[test]
    fn test_activator_factor_scales() {
        let params = GateParameters::default();
        assert_eq!(gate_function(0.8, 0.0, &params, 0.5), 0.4);
    }

    #[test]
    fn test_non_finite_input_is_zero() {
        let params = GateParameters::default();
        assert_eq!(gate_function(f64::NAN, 0.0, &params, 1.0), 0.0);
        assert_eq!(gate_function(f64::INFINITY, 0.0, &params, 1.0), 0.0);
    }

    #[test]
    fn test_result_stays_in_range() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10_000 {
            let params = GateParameters {
                minimum: rng.gen_range(-2.0..0.0),
                maximum: rng.gen_range(0.0..2.0),
                certainty: 1.0,
                amplification: rng.gen_range(-3.0..3.0),
                threshold: rng.gen_range(-1.0..1.0),
                decay: rng.gen_range(0.0..=1.0),
            };
            let input = rng.gen_range(-1e6..1e6);
            let previous = rng.gen_range(params.minimum..=params.maximum);
            let factor = rng.gen_range(0.0..2.0);

            let out = gate_function(input, previous, &params, factor);
            assert!(out.is_finite());
            assert!(out >= params.minimum && out <= params.maximum);
        }
    }

    #[test]
    fn test_new_gate_rests_inside_range() {
        let raised = GateParameters {
            minimum: 0.3,
            ..Default::default()
        };
        assert_eq!(Gate::new("gen", raised).activation, 0.3);

        let lowered = GateParameters {
            maximum: -0.2,
            ..Default::default()
        };
        assert_eq!(Gate::new("gen", lowered).activation, -0.2);
        assert_eq!(Gate::new("gen", GateParameters::default()).activation, 0.0);
    }

    #[test]
    fn test_parameter_names() {
        assert_eq!("decay".parse::<GateParameter>().unwrap(), GateParameter::Decay);
        assert!(matches!(
            "gain".parse::<GateParameter>(),
            Err(NetError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_parameter_validation() {
        let params = GateParameters::default();
        assert!(params.with(GateParameter::Minimum, 2.0).is_err());
        assert!(params.with(GateParameter::Decay, 1.5).is_err());
        assert!(params.with(GateParameter::Threshold, f64::NAN).is_err());

        let updated = params.with(GateParameter::Threshold, -100.0).unwrap();
        assert_eq!(updated.threshold, -100.0);
        assert_eq!(params.threshold, 0.0);
    }
}
