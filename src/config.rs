use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::activation::ActivationFn;
use crate::aggregation::AggregationFn;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("population_size must be greater than zero")]
    EmptyPopulation,

    #[error("compatibility_threshold must be positive, got {0}")]
    NonPositiveThreshold(f64),

    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("{name} must be a probability in [0, 1], got {value}")]
    NotAProbability { name: &'static str, value: f64 },

    #[error("{name} range is empty: min {min} > max {max}")]
    EmptyRange { name: &'static str, min: f64, max: f64 },

    #[error("survival_threshold must be in (0, 1], got {0}")]
    InvalidSurvivalThreshold(f64),

    #[error("tournament_size must be greater than zero")]
    EmptyTournament,

    #[error("activation_options must not be empty when activation_mutate_rate is positive")]
    NoActivationOptions,
}

/// The initialization and mutation policy of one real-valued gene attribute.
///
/// Fields missing from a deserialized section take the connection weight defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeConfig {
    /// Mean of the normal distribution new values are sampled from.
    pub init_mean: f64,

    /// Standard deviation of the normal distribution new values are sampled from.
    pub init_stdev: f64,

    pub min_value: f64,
    pub max_value: f64,

    /// The probability of perturbing the value by `Normal(0, mutate_power)`.
    pub mutate_rate: f64,

    pub mutate_power: f64,

    /// The probability of replacing the value with a freshly sampled one.
    ///
    /// Checked after `mutate_rate` failed, so the two are exclusive.
    pub replace_rate: f64,
}

impl Default for AttributeConfig {
    fn default() -> AttributeConfig {
        AttributeConfig::weight()
    }
}

impl AttributeConfig {
    fn weight() -> AttributeConfig {
        AttributeConfig {
            init_mean: 0.0,
            init_stdev: 1.0,
            min_value: -30.0,
            max_value: 30.0,
            mutate_rate: 0.8,
            mutate_power: 0.5,
            replace_rate: 0.1,
        }
    }

    fn bias() -> AttributeConfig {
        AttributeConfig {
            mutate_rate: 0.7,
            ..AttributeConfig::weight()
        }
    }

    fn response() -> AttributeConfig {
        AttributeConfig {
            init_mean: 1.0,
            init_stdev: 0.0,
            min_value: -30.0,
            max_value: 30.0,
            mutate_rate: 0.0,
            mutate_power: 0.0,
            replace_rate: 0.0,
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min_value).min(self.max_value)
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.min_value > self.max_value {
            return Err(ConfigError::EmptyRange {
                name,
                min: self.min_value,
                max: self.max_value,
            });
        }
        non_negative(name, self.init_stdev)?;
        non_negative(name, self.mutate_power)?;
        probability(name, self.mutate_rate)?;
        probability(name, self.replace_rate)
    }
}

/// The configuration controlling genome creation and mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeConfig {
    pub num_inputs: usize,
    pub num_outputs: usize,

    /// The number of hidden nodes every initial genome starts with.
    pub num_hidden: usize,

    /// Whether initial genomes start fully connected.
    ///
    /// Inputs connect to the hidden nodes and hidden nodes to outputs, or inputs straight to
    /// the outputs when there are no hidden nodes.
    pub start_connected: bool,

    /// Whether structural mutation must keep the network acyclic.
    pub feed_forward: bool,

    /// The activation function of new nodes.
    pub activation: ActivationFn,

    /// The functions a node may switch to when its activation mutates.
    pub activation_options: Vec<ActivationFn>,

    pub activation_mutate_rate: f64,

    /// The aggregation function of new nodes.
    pub aggregation: AggregationFn,

    pub weight: AttributeConfig,
    pub bias: AttributeConfig,
    pub response: AttributeConfig,

    pub node_add_prob: f64,
    pub node_delete_prob: f64,
    pub conn_add_prob: f64,
    pub conn_delete_prob: f64,

    /// The probability of flipping the enabled flag of each connection.
    pub enabled_mutate_rate: f64,

    /// Whether at most one structural mutation is applied per call, chosen proportionally to
    /// the structural probabilities.
    pub single_structural_mutation: bool,

    /// Whether structural mutations retry through an alternative when they find nothing to do.
    ///
    /// Adding a node without an enabled connection adds a connection instead, and adding a
    /// connection may re-enable an existing disabled one.
    pub structural_mutation_surer: bool,
}

impl Default for GenomeConfig {
    fn default() -> GenomeConfig {
        GenomeConfig {
            num_inputs: 2,
            num_outputs: 1,
            num_hidden: 0,
            start_connected: true,
            feed_forward: true,
            activation: ActivationFn::Sigmoid,
            activation_options: vec![ActivationFn::Sigmoid],
            activation_mutate_rate: 0.0,
            aggregation: AggregationFn::Sum,
            weight: AttributeConfig::weight(),
            bias: AttributeConfig::bias(),
            response: AttributeConfig::response(),
            node_add_prob: 0.2,
            node_delete_prob: 0.2,
            conn_add_prob: 0.5,
            conn_delete_prob: 0.5,
            enabled_mutate_rate: 0.01,
            single_structural_mutation: false,
            structural_mutation_surer: false,
        }
    }
}

impl GenomeConfig {
    pub fn new(num_inputs: usize, num_outputs: usize) -> GenomeConfig {
        GenomeConfig {
            num_inputs,
            num_outputs,
            ..GenomeConfig::default()
        }
    }

    pub fn set_num_hidden(&mut self, num_hidden: usize) -> &mut GenomeConfig {
        self.num_hidden = num_hidden;
        self
    }

    pub fn set_start_connected(&mut self, enabled: bool) -> &mut GenomeConfig {
        self.start_connected = enabled;
        self
    }

    pub fn set_feed_forward(&mut self, enabled: bool) -> &mut GenomeConfig {
        self.feed_forward = enabled;
        self
    }

    pub fn set_weight_mutate_rate(&mut self, rate: f64) -> &mut GenomeConfig {
        self.weight.mutate_rate = rate;
        self
    }

    pub fn set_weight_mutate_power(&mut self, power: f64) -> &mut GenomeConfig {
        self.weight.mutate_power = power;
        self
    }

    pub fn set_weight_replace_rate(&mut self, rate: f64) -> &mut GenomeConfig {
        self.weight.replace_rate = rate;
        self
    }

    pub fn set_bias_mutate_rate(&mut self, rate: f64) -> &mut GenomeConfig {
        self.bias.mutate_rate = rate;
        self
    }

    pub fn set_node_add_prob(&mut self, probability: f64) -> &mut GenomeConfig {
        self.node_add_prob = probability;
        self
    }

    pub fn set_node_delete_prob(&mut self, probability: f64) -> &mut GenomeConfig {
        self.node_delete_prob = probability;
        self
    }

    pub fn set_conn_add_prob(&mut self, probability: f64) -> &mut GenomeConfig {
        self.conn_add_prob = probability;
        self
    }

    pub fn set_conn_delete_prob(&mut self, probability: f64) -> &mut GenomeConfig {
        self.conn_delete_prob = probability;
        self
    }

    pub fn set_enabled_mutate_rate(&mut self, rate: f64) -> &mut GenomeConfig {
        self.enabled_mutate_rate = rate;
        self
    }

    pub fn set_structural_mutation_surer(&mut self, enabled: bool) -> &mut GenomeConfig {
        self.structural_mutation_surer = enabled;
        self
    }

    /// Disables every mutation, leaving structure and parameters untouched.
    pub fn disable_mutation(&mut self) -> &mut GenomeConfig {
        for attribute in [&mut self.weight, &mut self.bias, &mut self.response].iter_mut() {
            attribute.mutate_rate = 0.0;
            attribute.replace_rate = 0.0;
        }
        self.activation_mutate_rate = 0.0;
        self.node_add_prob = 0.0;
        self.node_delete_prob = 0.0;
        self.conn_add_prob = 0.0;
        self.conn_delete_prob = 0.0;
        self.enabled_mutate_rate = 0.0;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.weight.validate("weight")?;
        self.bias.validate("bias")?;
        self.response.validate("response")?;
        probability("activation_mutate_rate", self.activation_mutate_rate)?;
        probability("node_add_prob", self.node_add_prob)?;
        probability("node_delete_prob", self.node_delete_prob)?;
        probability("conn_add_prob", self.conn_add_prob)?;
        probability("conn_delete_prob", self.conn_delete_prob)?;
        probability("enabled_mutate_rate", self.enabled_mutate_rate)?;
        if self.activation_mutate_rate > 0.0 && self.activation_options.is_empty() {
            return Err(ConfigError::NoActivationOptions);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciationConfig {
    /// Genomes closer than this to a species representative belong to that species.
    pub compatibility_threshold: f64,

    /// The coefficient applied to the number of disjoint genes when calculating compatibility.
    pub disjoint_coefficient: f64,

    /// The coefficient applied to the mean weight difference of matching connections.
    pub weight_coefficient: f64,
}

impl Default for SpeciationConfig {
    fn default() -> SpeciationConfig {
        SpeciationConfig {
            compatibility_threshold: 3.0,
            disjoint_coefficient: 1.0,
            weight_coefficient: 0.5,
        }
    }
}

impl SpeciationConfig {
    pub fn set_compatibility_threshold(&mut self, threshold: f64) -> &mut SpeciationConfig {
        self.compatibility_threshold = threshold;
        self
    }

    pub fn set_disjoint_coefficient(&mut self, coefficient: f64) -> &mut SpeciationConfig {
        self.disjoint_coefficient = coefficient;
        self
    }

    pub fn set_weight_coefficient(&mut self, coefficient: f64) -> &mut SpeciationConfig {
        self.weight_coefficient = coefficient;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.compatibility_threshold > 0.0) {
            return Err(ConfigError::NonPositiveThreshold(self.compatibility_threshold));
        }
        non_negative("disjoint_coefficient", self.disjoint_coefficient)?;
        non_negative("weight_coefficient", self.weight_coefficient)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagnationConfig {
    /// Generations without improvement after which a species is removed, `0` disables removal.
    pub stagnation_limit: usize,

    /// The number of fittest species protected from stagnation removal.
    pub species_elitism: usize,
}

impl Default for StagnationConfig {
    fn default() -> StagnationConfig {
        StagnationConfig {
            stagnation_limit: 15,
            species_elitism: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReproductionConfig {
    /// The number of fittest members of each species copied unchanged into the next generation.
    pub elitism: usize,

    /// The fraction of each species, fittest first, allowed to become parents.
    pub survival_threshold: f64,

    /// The number of pool members sampled when selecting a parent.
    pub tournament_size: usize,

    /// The probability of producing a child by crossover rather than cloning.
    pub crossover_rate: f64,

    /// Whether species fitness is divided by member count before allocating offspring.
    pub fitness_sharing: bool,
}

impl Default for ReproductionConfig {
    fn default() -> ReproductionConfig {
        ReproductionConfig {
            elitism: 2,
            survival_threshold: 0.2,
            tournament_size: 3,
            crossover_rate: 0.75,
            fitness_sharing: false,
        }
    }
}

impl ReproductionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.survival_threshold > 0.0 && self.survival_threshold <= 1.0) {
            return Err(ConfigError::InvalidSurvivalThreshold(self.survival_threshold));
        }
        if self.tournament_size == 0 {
            return Err(ConfigError::EmptyTournament);
        }
        probability("crossover_rate", self.crossover_rate)
    }
}

/// The complete configuration of an evolutionary run.
///
/// Every section fills missing fields with defaults when deserialized, so a configuration
/// document only needs to name what it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub population_size: usize,

    /// Whether complete extinction reseeds a random population instead of ending the run.
    pub reset_on_extinction: bool,

    pub genome: GenomeConfig,
    pub speciation: SpeciationConfig,
    pub stagnation: StagnationConfig,
    pub reproduction: ReproductionConfig,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            population_size: 150,
            reset_on_extinction: false,
            genome: GenomeConfig::default(),
            speciation: SpeciationConfig::default(),
            stagnation: StagnationConfig::default(),
            reproduction: ReproductionConfig::default(),
        }
    }
}

impl Config {
    pub fn new(genome_config: GenomeConfig) -> Config {
        Config {
            genome: genome_config,
            ..Config::default()
        }
    }

    pub fn set_population_size(&mut self, size: usize) -> &mut Config {
        self.population_size = size;
        self
    }

    pub fn set_reset_on_extinction(&mut self, enabled: bool) -> &mut Config {
        self.reset_on_extinction = enabled;
        self
    }

    pub fn set_speciation_config(&mut self, config: SpeciationConfig) -> &mut Config {
        self.speciation = config;
        self
    }

    pub fn set_stagnation_limit(&mut self, limit: usize) -> &mut Config {
        self.stagnation.stagnation_limit = limit;
        self
    }

    pub fn set_elitism(&mut self, elitism: usize) -> &mut Config {
        self.reproduction.elitism = elitism;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        self.genome.validate()?;
        self.speciation.validate()?;
        self.reproduction.validate()
    }
}

fn probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::NotAProbability { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}
