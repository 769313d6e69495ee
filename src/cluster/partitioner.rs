//! Key → token partitioning
//!
//! Maps a series key onto the hash ring and resolves the owning node from an
//! assignment snapshot taken from the token coordinator.

use std::collections::HashMap;

/// Hash-ring partitioner
#[derive(Debug, Clone, Copy)]
pub struct Partitioner {
    num_tokens: u64,
}

impl Partitioner {
    pub fn new(num_tokens: u64) -> Self {
        Self { num_tokens }
    }

    /// Compute the ring token for a series key
    pub fn token_for_key(&self, key: &str) -> u64 {
        let hash = blake3::hash(key.as_bytes());
        let hash_u64 = u64::from_le_bytes(hash.as_bytes()[0..8].try_into().unwrap());
        hash_u64 % self.num_tokens
    }

    /// Resolve the node owning `key` against an assignment snapshot
    pub fn node_for_key<'a>(
        &self,
        key: &str,
        assignments: &'a HashMap<u64, String>,
    ) -> Option<&'a str> {
        assignments
            .get(&self.token_for_key(key))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_deterministic() {
        let partitioner = Partitioner::new(256);
        assert_eq!(
            partitioner.token_for_key("cpu,host=a"),
            partitioner.token_for_key("cpu,host=a")
        );
    }

    #[test]
    fn test_token_within_ring() {
        let partitioner = Partitioner::new(16);
        for i in 0..100 {
            assert!(partitioner.token_for_key(&format!("series-{}", i)) < 16);
        }
    }

    #[test]
    fn test_node_for_key() {
        let partitioner = Partitioner::new(4);
        let key = "cpu,host=a";
        let token = partitioner.token_for_key(key);

        let mut assignments = HashMap::new();
        assignments.insert(token, "node-a".to_string());

        assert_eq!(partitioner.node_for_key(key, &assignments), Some("node-a"));
        assert_eq!(partitioner.node_for_key(key, &HashMap::new()), None);
    }
}
