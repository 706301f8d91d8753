use std::fmt;

use rand::Rng;

use crate::activation::ActivationFn;
use crate::aggregation::AggregationFn;

pub type NodeKey = u32;

/// The role a node plays in the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Input,
    Hidden,
    Output,
    /// A constant `1.0` source which takes no value from the input vector.
    Bias,
}

impl NodeKind {
    /// Whether the node is fed externally rather than computed from its connections.
    pub fn is_source(&self) -> bool {
        match self {
            NodeKind::Input | NodeKind::Bias => true,
            NodeKind::Hidden | NodeKind::Output => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeGene {
    pub key: NodeKey,

    pub kind: NodeKind,

    /// The bias added to the aggregated input.
    ///
    /// We store the bias in the `NodeGene` instead of via a `ConnectionGene` since
    /// we don't want bias connection to be splittable.
    pub bias: f64,

    /// The gain applied to the aggregated input before the bias is added.
    pub response: f64,

    /// The function used in determining neuron activation.
    pub activation_fn: ActivationFn,

    /// The function used in aggregating across synapses prior to calculating activation.
    pub aggregation_fn: AggregationFn,

    pub enabled: bool,
}

impl NodeGene {
    pub fn new(key: NodeKey, kind: NodeKind) -> NodeGene {
        NodeGene {
            key,
            kind,
            bias: 0.0,
            response: 1.0,
            activation_fn: ActivationFn::default(),
            aggregation_fn: AggregationFn::default(),
            enabled: true,
        }
    }

    pub fn with_bias(mut self, bias: f64) -> NodeGene {
        self.bias = bias;
        self
    }

    pub fn with_activation(mut self, activation_fn: ActivationFn) -> NodeGene {
        self.activation_fn = activation_fn;
        self
    }

    /// Calculates the activation of the node given its weighted inputs.
    pub fn activate(&self, weighted_inputs: &[f64]) -> f64 {
        let aggregation = self.aggregation_fn.aggregate(weighted_inputs);
        self.activation_fn.eval(self.bias + self.response * aggregation)
    }

    /// Create a new `NodeGene` by inheriting this gene or the other one with equal probability.
    pub(crate) fn crossover<R: Rng>(&self, other: &NodeGene, rng: &mut R) -> NodeGene {
        debug_assert_eq!(self.key, other.key, "Only the same gene should be crossed");

        if rng.gen::<bool>() {
            self.clone()
        } else {
            other.clone()
        }
    }
}

/// The identity of a connection: the ordered pair `(input, output)` of the node keys it joins.
///
/// Two genomes holding the same `ConnectionKey` hold the same putative connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey(pub NodeKey, pub NodeKey);

impl ConnectionKey {
    pub fn input(&self) -> NodeKey {
        self.0
    }

    pub fn output(&self) -> NodeKey {
        self.1
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.0, self.1)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionGene {
    pub key: ConnectionKey,

    /// The synaptic excitement applied to the input to produce the output.
    pub weight: f64,

    /// Whether the connection is enabled.
    ///
    /// Connections can be disabled when being split by the creation of new nodes or through
    /// mutation but are persisted in the genome as a means of maintaining ancestry.
    pub enabled: bool,
}

impl ConnectionGene {
    pub fn new(input: NodeKey, output: NodeKey, weight: f64) -> ConnectionGene {
        ConnectionGene {
            key: ConnectionKey(input, output),
            weight,
            enabled: true,
        }
    }

    pub fn input(&self) -> NodeKey {
        self.key.input()
    }

    pub fn output(&self) -> NodeKey {
        self.key.output()
    }

    /// The absolute weight difference between this `ConnectionGene` and another.
    pub fn weight_distance(&self, other: &ConnectionGene) -> f64 {
        (self.weight - other.weight).abs()
    }

    /// Create a new `ConnectionGene` by inheriting this gene or the other one with equal
    /// probability.
    pub(crate) fn crossover<R: Rng>(&self, other: &ConnectionGene, rng: &mut R) -> ConnectionGene {
        debug_assert_eq!(self.key, other.key, "Only the same gene should be crossed");

        if rng.gen::<bool>() {
            self.clone()
        } else {
            other.clone()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use approx::assert_relative_eq;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_node_activate() {
        let mut node = NodeGene::new(0, NodeKind::Output).with_activation(ActivationFn::Identity);
        node.bias = 0.5;
        node.response = 2.0;

        assert_relative_eq!(node.activate(&[1.0, -0.25]), 2.0);

        // Unconnected nodes only see their bias.
        assert_relative_eq!(node.activate(&[]), 0.5);
    }

    #[test]
    fn test_connection_distance() {
        let con_1 = ConnectionGene::new(0, 1, 1.0);
        let mut con_2 = ConnectionGene::new(0, 1, 1.0);

        // Same weights.
        assert_eq!(con_1.weight_distance(&con_2), 0.0);

        con_2.weight = 0.5;

        // Weights differ.
        assert_eq!(con_1.weight_distance(&con_2), con_2.weight_distance(&con_1));
        assert_eq!(con_1.weight_distance(&con_2), 0.5);
    }

    #[test]
    fn test_connection_crossover() {
        let con_1 = ConnectionGene::new(0, 1, 0.1);
        let mut con_2 = ConnectionGene::new(0, 1, 0.2);
        con_2.enabled = false;

        // `StepRng` yielding only zeros picks the other gene, only ones picks this gene.
        let child = con_1.crossover(&con_2, &mut StepRng::new(0, 0));
        assert_eq!(child, con_2);

        let child = con_1.crossover(&con_2, &mut StepRng::new(u64::max_value(), 0));
        assert_eq!(child, con_1);
    }

    #[test]
    fn test_node_crossover() {
        let node_1 = NodeGene::new(3, NodeKind::Hidden).with_bias(1.0);
        let node_2 = NodeGene::new(3, NodeKind::Hidden).with_bias(-1.0);

        let child = node_1.crossover(&node_2, &mut StepRng::new(0, 0));
        assert_eq!(child.bias, -1.0);
    }

    #[test]
    fn test_connection_key_order() {
        assert!(ConnectionKey(0, 5) < ConnectionKey(1, 0));
        assert!(ConnectionKey(1, 0) < ConnectionKey(1, 2));
        assert_eq!(ConnectionKey(4, 2).to_string(), "4 -> 2");
    }
}
