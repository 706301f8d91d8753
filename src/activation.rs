use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The function applied to a node's aggregated input to produce its output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationFn {
    Sigmoid,
    Tanh,
    Relu,
    Identity,
    /// Clamps the value to `[-1, 1]`.
    Clamped,
    Gauss,
    Sin,
    Abs,
}

impl Default for ActivationFn {
    fn default() -> ActivationFn {
        ActivationFn::Sigmoid
    }
}

impl ActivationFn {
    pub const ALL: [ActivationFn; 8] = [
        ActivationFn::Sigmoid,
        ActivationFn::Tanh,
        ActivationFn::Relu,
        ActivationFn::Identity,
        ActivationFn::Clamped,
        ActivationFn::Gauss,
        ActivationFn::Sin,
        ActivationFn::Abs,
    ];

    pub fn eval(&self, val: f64) -> f64 {
        match self {
            ActivationFn::Sigmoid => sigmoid_activation(val),
            ActivationFn::Tanh => val.tanh(),
            ActivationFn::Relu => val.max(0.0),
            ActivationFn::Identity => val,
            ActivationFn::Clamped => val.max(-1.0).min(1.0),
            ActivationFn::Gauss => (-val * val).exp(),
            ActivationFn::Sin => val.sin(),
            ActivationFn::Abs => val.abs(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivationFn::Sigmoid => "sigmoid",
            ActivationFn::Tanh => "tanh",
            ActivationFn::Relu => "relu",
            ActivationFn::Identity => "identity",
            ActivationFn::Clamped => "clamped",
            ActivationFn::Gauss => "gauss",
            ActivationFn::Sin => "sin",
            ActivationFn::Abs => "abs",
        }
    }
}

fn sigmoid_activation(val: f64) -> f64 {
    1.0 / (1.0 + (-val).exp())
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown activation function `{0}`")]
pub struct UnknownActivation(pub String);

impl FromStr for ActivationFn {
    type Err = UnknownActivation;

    fn from_str(s: &str) -> Result<ActivationFn, UnknownActivation> {
        ActivationFn::ALL
            .iter()
            .find(|f| f.name() == s)
            .copied()
            .ok_or_else(|| UnknownActivation(s.to_owned()))
    }
}

impl fmt::Display for ActivationFn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn test_sigmoid() {
        assert_relative_eq!(ActivationFn::Sigmoid.eval(0.0), 0.5);
        assert!(ActivationFn::Sigmoid.eval(50.0) > 0.999);
        assert!(ActivationFn::Sigmoid.eval(-50.0) < 0.001);
    }

    #[test]
    fn test_clamped() {
        assert_eq!(ActivationFn::Clamped.eval(3.0), 1.0);
        assert_eq!(ActivationFn::Clamped.eval(-3.0), -1.0);
        assert_eq!(ActivationFn::Clamped.eval(0.25), 0.25);
    }

    #[test]
    fn test_relu() {
        assert_eq!(ActivationFn::Relu.eval(-2.0), 0.0);
        assert_eq!(ActivationFn::Relu.eval(2.0), 2.0);
    }

    #[test]
    fn test_name_round_trip() {
        for f in ActivationFn::ALL.iter() {
            assert_eq!(f.name().parse::<ActivationFn>(), Ok(*f));
        }
        assert_eq!(
            "softmax".parse::<ActivationFn>(),
            Err(UnknownActivation("softmax".to_owned()))
        );
    }
}
