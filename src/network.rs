use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::gene::{ConnectionKey, NodeGene, NodeKey, NodeKind};
use crate::genome::Genome;

#[derive(Debug, Error, PartialEq)]
pub enum NetworkError {
    #[error("expected {expected} inputs, got {actual}")]
    InputLength { expected: usize, actual: usize },

    #[error("node {dependent} was activated before its input {node}")]
    MissingNodeValue { node: NodeKey, dependent: NodeKey },

    /// A genome built through `Genome::add_connection` and `Genome::remove_node` never holds
    /// such a connection.
    #[error("enabled connection {0} references a missing node")]
    DanglingConnection(ConnectionKey),

    #[error("enabled connections form a cycle")]
    Cycle,
}

/// The evaluation of a single non-source node.
#[derive(Clone, Debug)]
struct NodeEval {
    node: NodeGene,

    /// The source node and weight of every enabled incoming connection.
    links: Vec<(NodeKey, f64)>,
}

/// A genome compiled into layers which can be activated repeatedly.
///
/// The network holds no state between activations.
#[derive(Clone, Debug)]
pub struct FeedForwardNetwork {
    input_keys: Vec<NodeKey>,
    bias_keys: Vec<NodeKey>,
    output_keys: Vec<NodeKey>,

    /// Every non-source node, ordered by layer and then by key.
    node_evals: Vec<NodeEval>,
}

impl FeedForwardNetwork {
    /// Compiles the enabled structure of a `Genome`.
    ///
    /// Connections touching a disabled node are ignored.
    pub fn create(genome: &Genome) -> Result<FeedForwardNetwork, NetworkError> {
        let nodes = genome.nodes();

        let mut active: Vec<ConnectionKey> = Vec::new();
        for con in genome.enabled_connections() {
            let (input, output) = match (nodes.get(&con.input()), nodes.get(&con.output())) {
                (Some(input), Some(output)) => (input, output),
                _ => return Err(NetworkError::DanglingConnection(con.key)),
            };
            if input.enabled && output.enabled {
                active.push(con.key);
            }
        }

        let layers = assign_layers(nodes.keys().cloned(), &active)?;

        let mut links_by_output: HashMap<NodeKey, Vec<(NodeKey, f64)>> = HashMap::new();
        for key in active.iter() {
            if let Some(con) = genome.connection(*key) {
                links_by_output
                    .entry(key.output())
                    .or_insert_with(Vec::new)
                    .push((key.input(), con.weight));
            }
        }

        let mut node_evals: Vec<NodeEval> = nodes
            .values()
            .filter(|node| !node.kind.is_source())
            .map(|node| NodeEval {
                node: node.clone(),
                links: links_by_output.remove(&node.key).unwrap_or_default(),
            })
            .collect();
        node_evals.sort_by_key(|eval| {
            let key = eval.node.key;
            (layers.get(&key).cloned().unwrap_or(0), key)
        });

        Ok(FeedForwardNetwork {
            input_keys: genome.input_keys(),
            bias_keys: genome.node_keys(NodeKind::Bias),
            output_keys: genome.output_keys(),
            node_evals,
        })
    }

    pub fn num_inputs(&self) -> usize {
        self.input_keys.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.output_keys.len()
    }

    /// Activates the network.
    ///
    /// # Arguments
    ///
    /// * `inputs` - The values of the input nodes, in ascending input key order.
    ///
    /// # Returns
    ///
    /// The values of the output nodes, in ascending output key order.
    pub fn activate(&self, inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
        if inputs.len() != self.input_keys.len() {
            return Err(NetworkError::InputLength {
                expected: self.input_keys.len(),
                actual: inputs.len(),
            });
        }

        let mut values: HashMap<NodeKey, f64> =
            HashMap::with_capacity(inputs.len() + self.bias_keys.len() + self.node_evals.len());
        for (&key, &value) in self.input_keys.iter().zip(inputs.iter()) {
            values.insert(key, value);
        }
        for &key in self.bias_keys.iter() {
            values.insert(key, 1.0);
        }

        let mut weighted_inputs: Vec<f64> = Vec::new();
        for eval in self.node_evals.iter() {
            weighted_inputs.clear();
            for &(source, weight) in eval.links.iter() {
                let value = values.get(&source).ok_or(NetworkError::MissingNodeValue {
                    node: source,
                    dependent: eval.node.key,
                })?;
                weighted_inputs.push(weight * value);
            }

            values.insert(eval.node.key, eval.node.activate(&weighted_inputs));
        }

        self.output_keys
            .iter()
            .map(|&key| {
                values.get(&key).cloned().ok_or(NetworkError::MissingNodeValue {
                    node: key,
                    dependent: key,
                })
            })
            .collect()
    }
}

/// Compiles and activates a `Genome` in a single step.
pub fn activate(genome: &Genome, inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
    FeedForwardNetwork::create(genome)?.activate(inputs)
}

/// Assigns every node the minimal layer such that every connection points to a higher layer.
fn assign_layers<I>(
    node_keys: I,
    connections: &[ConnectionKey],
) -> Result<BTreeMap<NodeKey, usize>, NetworkError>
where
    I: Iterator<Item = NodeKey>,
{
    let mut layers: BTreeMap<NodeKey, usize> = node_keys.map(|key| (key, 0)).collect();

    // An acyclic graph settles after at most one pass per node.
    for _ in 0..=layers.len() {
        let mut changed = false;
        for edge in connections.iter() {
            let in_layer = layers.get(&edge.input()).cloned().unwrap_or(0);
            let out_layer = layers.entry(edge.output()).or_insert(0);
            if in_layer >= *out_layer {
                *out_layer = in_layer + 1;
                changed = true;
            }
        }
        if !changed {
            return Ok(layers);
        }
    }

    Err(NetworkError::Cycle)
}
