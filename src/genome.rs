use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use rand::Rng;
use thiserror::Error;

use crate::config::{GenomeConfig, SpeciationConfig};
use crate::gene::{ConnectionGene, ConnectionKey, NodeGene, NodeKey, NodeKind};
use crate::mutation;

pub type GenomeKey = u32;

#[derive(Debug, Error, PartialEq)]
pub enum GenomeError {
    #[error("node {0} already exists")]
    DuplicateNode(NodeKey),

    #[error("connection {0} already exists")]
    DuplicateConnection(ConnectionKey),

    #[error("connection {connection} references missing node {node}")]
    MissingEndpoint {
        connection: ConnectionKey,
        node: NodeKey,
    },
}

/// A graph-structured genotype: node genes, connection genes and an optional fitness.
///
/// Genes are kept in ordered maps so that every traversal, and therefore every random
/// choice made over them, is reproducible.
#[derive(Clone, Debug, PartialEq)]
pub struct Genome {
    key: GenomeKey,

    /// `NodeGenes` by their key.
    nodes: BTreeMap<NodeKey, NodeGene>,

    /// `ConnectionGenes` by their edge node keys.
    connections: BTreeMap<ConnectionKey, ConnectionGene>,

    /// Unset until the genome has been evaluated.
    pub fitness: Option<f64>,
}

impl Genome {
    /// Creates a genome without any genes.
    pub fn new(key: GenomeKey) -> Genome {
        Genome {
            key,
            nodes: BTreeMap::new(),
            connections: BTreeMap::new(),
            fitness: None,
        }
    }

    /// Creates a genome of the initial topology described by `config`.
    ///
    /// Inputs take the keys `0..num_inputs`, outputs the following `num_outputs` keys and the
    /// initial hidden nodes the `num_hidden` keys after that.
    pub fn initial<R: Rng>(key: GenomeKey, config: &GenomeConfig, rng: &mut R) -> Genome {
        let mut genome = Genome::new(key);

        let num_inputs = config.num_inputs as NodeKey;
        let num_outputs = config.num_outputs as NodeKey;
        let num_hidden = config.num_hidden as NodeKey;

        let input_keys: Vec<NodeKey> = (0..num_inputs).collect();
        let output_keys: Vec<NodeKey> = (num_inputs..num_inputs + num_outputs).collect();
        let hidden_keys: Vec<NodeKey> =
            (num_inputs + num_outputs..num_inputs + num_outputs + num_hidden).collect();

        for &key in input_keys.iter() {
            genome.nodes.insert(key, NodeGene::new(key, NodeKind::Input));
        }
        for &key in output_keys.iter() {
            genome.nodes.insert(key, mutation::init_node(key, NodeKind::Output, config, rng));
        }
        for &key in hidden_keys.iter() {
            genome.nodes.insert(key, mutation::init_node(key, NodeKind::Hidden, config, rng));
        }

        // If the inputs and outputs start connected then create the initial ConnectionGenes
        // which connect each layer to the next.
        if config.start_connected {
            let layers: Vec<&Vec<NodeKey>> = if hidden_keys.is_empty() {
                vec![&input_keys, &output_keys]
            } else {
                vec![&input_keys, &hidden_keys, &output_keys]
            };

            for pair in layers.windows(2) {
                for &in_key in pair[0].iter() {
                    for &out_key in pair[1].iter() {
                        let weight = mutation::init_value(&config.weight, rng);
                        let connection = ConnectionGene::new(in_key, out_key, weight);
                        genome.connections.insert(connection.key, connection);
                    }
                }
            }
        }

        genome
    }

    pub fn key(&self) -> GenomeKey {
        self.key
    }

    pub fn nodes(&self) -> &BTreeMap<NodeKey, NodeGene> {
        &self.nodes
    }

    pub fn connections(&self) -> &BTreeMap<ConnectionKey, ConnectionGene> {
        &self.connections
    }

    pub fn node(&self, key: NodeKey) -> Option<&NodeGene> {
        self.nodes.get(&key)
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut NodeGene> {
        self.nodes.get_mut(&key)
    }

    pub fn connection(&self, key: ConnectionKey) -> Option<&ConnectionGene> {
        self.connections.get(&key)
    }

    pub fn connection_mut(&mut self, key: ConnectionKey) -> Option<&mut ConnectionGene> {
        self.connections.get_mut(&key)
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut NodeGene> {
        self.nodes.values_mut()
    }

    pub(crate) fn connections_mut(&mut self) -> impl Iterator<Item = &mut ConnectionGene> {
        self.connections.values_mut()
    }

    pub fn enabled_connections(&self) -> impl Iterator<Item = &ConnectionGene> {
        self.connections.values().filter(|con| con.enabled)
    }

    /// Keys of the nodes of `kind`, ascending.
    pub fn node_keys(&self, kind: NodeKind) -> Vec<NodeKey> {
        self.nodes
            .values()
            .filter(|node| node.kind == kind)
            .map(|node| node.key)
            .collect()
    }

    pub fn input_keys(&self) -> Vec<NodeKey> {
        self.node_keys(NodeKind::Input)
    }

    pub fn output_keys(&self) -> Vec<NodeKey> {
        self.node_keys(NodeKind::Output)
    }

    /// Adds a node, rejecting a key which is already present.
    pub fn add_node(&mut self, node: NodeGene) -> Result<(), GenomeError> {
        if self.nodes.contains_key(&node.key) {
            return Err(GenomeError::DuplicateNode(node.key));
        }
        self.nodes.insert(node.key, node);
        Ok(())
    }

    /// Adds a connection between two existing nodes, rejecting a key which is already present.
    pub fn add_connection(&mut self, connection: ConnectionGene) -> Result<(), GenomeError> {
        if self.connections.contains_key(&connection.key) {
            return Err(GenomeError::DuplicateConnection(connection.key));
        }
        for &node in [connection.input(), connection.output()].iter() {
            if !self.nodes.contains_key(&node) {
                return Err(GenomeError::MissingEndpoint {
                    connection: connection.key,
                    node,
                });
            }
        }
        self.connections.insert(connection.key, connection);
        Ok(())
    }

    /// Removes a node together with every connection touching it.
    pub fn remove_node(&mut self, key: NodeKey) -> Option<NodeGene> {
        let node = self.nodes.remove(&key)?;
        self.connections
            .retain(|edge, _| edge.input() != key && edge.output() != key);
        Some(node)
    }

    pub fn remove_connection(&mut self, key: ConnectionKey) -> Option<ConnectionGene> {
        self.connections.remove(&key)
    }

    /// Deep-copies every gene into a new genome identified by `new_key`.
    ///
    /// The fitness is copied as well, callers producing offspring reset it.
    pub fn clone_with_key(&self, new_key: GenomeKey) -> Genome {
        Genome {
            key: new_key,
            ..self.clone()
        }
    }

    /// Calculates the compatibility distance between this `Genome` and another.
    ///
    /// The distance is `disjoint_coefficient * D + weight_coefficient * W` where `D` counts the
    /// node and connection keys present in only one of the genomes and `W` is the mean absolute
    /// weight difference of the connections present in both.
    ///
    /// # Arguments
    ///
    /// * `other` - The other `Genome` to compare against.
    ///
    /// * `speciation_config` - The configuration governing the coefficients of the equation.
    pub fn distance(&self, other: &Genome, speciation_config: &SpeciationConfig) -> f64 {
        let disjoint_nodes = disjoint_count(&self.nodes, &other.nodes);
        let disjoint_connections = disjoint_count(&self.connections, &other.connections);

        let (matching, weight_difference) = self
            .connections
            .iter()
            .filter_map(|(key, con)| other.connections.get(key).map(|o| con.weight_distance(o)))
            .fold((0_usize, 0.0), |(count, sum), diff| (count + 1, sum + diff));

        let mean_weight_difference = if matching > 0 {
            weight_difference / matching as f64
        } else {
            0.0
        };

        speciation_config.disjoint_coefficient * (disjoint_nodes + disjoint_connections) as f64
            + speciation_config.weight_coefficient * mean_weight_difference
    }

    /// Creates a child of two parents.
    ///
    /// The fitter parent (the first one on ties) decides which genes exist in the child. Genes
    /// present in both parents are inherited from either with equal probability, genes only the
    /// less fit parent has are dropped. The child is unevaluated.
    pub fn crossover<R: Rng>(
        key: GenomeKey,
        parent_1: &Genome,
        parent_2: &Genome,
        rng: &mut R,
    ) -> Genome {
        let (fitter, other) = if parent_2.fitness > parent_1.fitness {
            (parent_2, parent_1)
        } else {
            (parent_1, parent_2)
        };

        let nodes = fitter
            .nodes
            .iter()
            .map(|(key, node)| {
                let gene = match other.nodes.get(key) {
                    Some(other_node) => node.crossover(other_node, rng),
                    None => node.clone(),
                };
                (*key, gene)
            })
            .collect();

        let connections = fitter
            .connections
            .iter()
            .map(|(key, con)| {
                let gene = match other.connections.get(key) {
                    Some(other_con) => con.crossover(other_con, rng),
                    None => con.clone(),
                };
                (*key, gene)
            })
            .collect();

        Genome {
            key,
            nodes,
            connections,
            fitness: None,
        }
    }

    /// Checks whether adding `candidate` would close a cycle.
    ///
    /// Every connection is considered, enabled or not, since disabled connections can become
    /// enabled again later on.
    pub fn creates_cycle(&self, candidate: ConnectionKey) -> bool {
        if candidate.input() == candidate.output() {
            return true;
        }

        let mut out_keys_by_in_key: HashMap<NodeKey, Vec<NodeKey>> = HashMap::new();
        for edge in self.connections.keys() {
            out_keys_by_in_key
                .entry(edge.input())
                .or_insert_with(Vec::new)
                .push(edge.output());
        }

        // BFS from the candidate's output looking for its input.
        let mut visited: HashSet<NodeKey> = HashSet::new();
        let mut queue: VecDeque<NodeKey> = VecDeque::new();
        queue.push_back(candidate.output());

        while let Some(key) = queue.pop_front() {
            if key == candidate.input() {
                return true;
            }
            if !visited.insert(key) {
                continue;
            }
            if let Some(out_keys) = out_keys_by_in_key.get(&key) {
                queue.extend(out_keys.iter().cloned());
            }
        }

        false
    }
}

fn disjoint_count<K: Ord, V>(a: &BTreeMap<K, V>, b: &BTreeMap<K, V>) -> usize {
    let only_a = a.keys().filter(|key| !b.contains_key(key)).count();
    let only_b = b.keys().filter(|key| !a.contains_key(key)).count();
    only_a + only_b
}
