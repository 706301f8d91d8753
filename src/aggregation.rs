use serde::{Deserialize, Serialize};

/// The function used to combine the weighted inputs of a node.
///
/// Every variant aggregates an empty input to `0.0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFn {
    Sum,
    Product,
    Max,
    Min,
    Mean,
}

impl Default for AggregationFn {
    fn default() -> AggregationFn {
        AggregationFn::Sum
    }
}

impl AggregationFn {
    pub fn aggregate(&self, vals: &[f64]) -> f64 {
        if vals.is_empty() {
            return 0.0;
        }

        match self {
            AggregationFn::Sum => vals.iter().sum(),
            AggregationFn::Product => vals.iter().product(),
            AggregationFn::Max => vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            AggregationFn::Min => vals.iter().cloned().fold(f64::INFINITY, f64::min),
            AggregationFn::Mean => vals.iter().sum::<f64>() / vals.len() as f64,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_aggregate() {
        let vals = [1.0, -2.0, 4.0];

        assert_eq!(AggregationFn::Sum.aggregate(&vals), 3.0);
        assert_eq!(AggregationFn::Product.aggregate(&vals), -8.0);
        assert_eq!(AggregationFn::Max.aggregate(&vals), 4.0);
        assert_eq!(AggregationFn::Min.aggregate(&vals), -2.0);
        assert_eq!(AggregationFn::Mean.aggregate(&vals), 1.0);
    }

    #[test]
    fn test_aggregate_empty() {
        assert_eq!(AggregationFn::Sum.aggregate(&[]), 0.0);
        assert_eq!(AggregationFn::Product.aggregate(&[]), 0.0);
        assert_eq!(AggregationFn::Max.aggregate(&[]), 0.0);
        assert_eq!(AggregationFn::Min.aggregate(&[]), 0.0);
        assert_eq!(AggregationFn::Mean.aggregate(&[]), 0.0);
    }
}
