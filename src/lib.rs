pub mod activation;
pub mod aggregation;
pub mod config;
pub mod fitness;
pub mod gene;
pub mod genome;
pub mod innovation;
pub mod mutation;
pub mod network;
pub mod population;
pub mod reproduction;
pub mod speciation;
pub mod stagnation;
