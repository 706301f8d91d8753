use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::gene::{ConnectionKey, NodeKey};

/// Stores historical origins of hidden node innovations which can be used to dedupe
/// the same innovation across genomes and generations.
///
/// Connections need no archive of their own since their key already is the pair of nodes
/// they join, so two genomes splitting the same connection end up with matching node and
/// connection genes.
#[derive(Clone, Debug)]
pub struct InnovationArchive {
    /// The next hidden node key handed out when no recorded innovation applies.
    next_node_key: NodeKey,

    /// The hidden node keys mapped by the connection they "split" to be created.
    ///
    /// A connection can be split multiple times within one genome (the original is just
    /// disabled and may be re-enabled) so each origin keeps the list of every key minted for it.
    hidden_node_keys_by_origin: HashMap<ConnectionKey, Vec<NodeKey>>,
}

impl InnovationArchive {
    /// Creates an archive minting keys from `first_free_key` upwards.
    pub fn new(first_free_key: NodeKey) -> InnovationArchive {
        InnovationArchive {
            next_node_key: first_free_key,
            hidden_node_keys_by_origin: HashMap::new(),
        }
    }

    /// Makes sure a key which entered the population from outside is never minted again.
    pub fn observe_node_key(&mut self, key: NodeKey) {
        if key >= self.next_node_key {
            self.next_node_key = key + 1;
        }
    }

    /// Record a hidden node innovation splitting `origin`.
    ///
    /// # Arguments
    ///
    /// * `origin` - The connection being split.
    ///
    /// * `in_use` - Whether a key is already taken in the genome being mutated.
    ///
    /// # Returns
    ///
    /// The first key recorded for `origin` which the genome doesn't use yet, or a new key.
    pub fn record_hidden_node_innovation<F>(&mut self, origin: ConnectionKey, in_use: F) -> NodeKey
    where
        F: Fn(NodeKey) -> bool,
    {
        match self.hidden_node_keys_by_origin.entry(origin) {
            Entry::Occupied(o) => {
                let keys = o.into_mut();
                if let Some(&key) = keys.iter().find(|&&key| !in_use(key)) {
                    return key;
                }

                let new_key = mint(&mut self.next_node_key, &in_use);
                keys.push(new_key);
                new_key
            }
            Entry::Vacant(v) => {
                let new_key = mint(&mut self.next_node_key, &in_use);
                v.insert(vec![new_key]);
                new_key
            }
        }
    }
}

fn mint<F>(next_node_key: &mut NodeKey, in_use: &F) -> NodeKey
where
    F: Fn(NodeKey) -> bool,
{
    while in_use(*next_node_key) {
        *next_node_key += 1;
    }
    let key = *next_node_key;
    *next_node_key += 1;
    key
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    pub fn test_record_hidden_node_innovation() {
        let mut archive = InnovationArchive::new(3);
        let unused = |_| false;

        assert_eq!(archive.record_hidden_node_innovation(ConnectionKey(1, 2), unused), 3);

        // Same split creates same innovation.
        assert_eq!(archive.record_hidden_node_innovation(ConnectionKey(1, 2), unused), 3);

        // Same split in a genome already holding the first node creates new innovation.
        assert_eq!(archive.record_hidden_node_innovation(ConnectionKey(1, 2), |k| k == 3), 4);
        assert_eq!(archive.record_hidden_node_innovation(ConnectionKey(1, 2), |k| k == 3), 4);

        // Reverse of an existing split creates a new innovation.
        assert_eq!(archive.record_hidden_node_innovation(ConnectionKey(2, 1), unused), 5);

        // An entirely new split creates a new innovation.
        assert_eq!(archive.record_hidden_node_innovation(ConnectionKey(0, 2), unused), 6);
    }

    #[test]
    pub fn test_observe_node_key() {
        let mut archive = InnovationArchive::new(3);

        archive.observe_node_key(1);
        assert_eq!(archive.record_hidden_node_innovation(ConnectionKey(0, 2), |_| false), 3);

        archive.observe_node_key(10);
        assert_eq!(archive.record_hidden_node_innovation(ConnectionKey(1, 2), |_| false), 11);
    }

    #[test]
    pub fn test_mint_skips_keys_in_use() {
        let mut archive = InnovationArchive::new(3);

        let key = archive.record_hidden_node_innovation(ConnectionKey(0, 2), |k| k == 3 || k == 4);
        assert_eq!(key, 5);
    }
}
