//! Deterministic hashing of element identifiers into the `i32` range the
//! routing table partitions (C1).

/// Pure, deterministic mapping from an identifier to a signed 32-bit hash.
/// Must be stable across processes and restarts: every `Coordinator`/`Router`
/// sharing a cluster has to agree on the same function.
pub trait HashGenerator: Send + Sync {
    fn hash(&self, value: &str) -> i32;
}

/// CRC32C of the UTF-8 bytes, reinterpreted as a signed integer. Distributes
/// short strings (UUIDs, names) close enough to uniformly for range
/// partitioning, and is cheap enough to run on every routing decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32cHashGenerator;

impl HashGenerator for Crc32cHashGenerator {
    fn hash(&self, value: &str) -> i32 {
        crc32c::crc32c(value.as_bytes()) as i32
    }
}

/// The two named hash generator instances the Manager consults: users and
/// groups are hashed independently so a cluster could, in principle, use a
/// different function for each (`GroupToGroupMapping` keys are hashed with
/// the group generator; `Entity` keys are never hashed through this path,
/// see `client::ShardClientManager::get_client`).
#[derive(Clone)]
pub struct Hashers {
    pub user: std::sync::Arc<dyn HashGenerator>,
    pub group: std::sync::Arc<dyn HashGenerator>,
}

impl Default for Hashers {
    fn default() -> Self {
        Self {
            user: std::sync::Arc::new(Crc32cHashGenerator),
            group: std::sync::Arc::new(Crc32cHashGenerator),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let h = Crc32cHashGenerator;
        assert_eq!(h.hash("alice"), h.hash("alice"));
    }

    #[test]
    fn test_hash_differs_for_different_input() {
        let h = Crc32cHashGenerator;
        assert_ne!(h.hash("alice"), h.hash("bob"));
    }

    #[test]
    fn test_s1_scenario_hashes() {
        // S1 posits userHash("alice") = -100, userHash("bob") = 200 as given
        // test fixture values, not CRC32C outputs; the property under test
        // here is just that real hashes land deterministically on either
        // side of a midpoint split, which the routing table test in
        // `segment` (accessgate-config) exercises directly with literal
        // hashes. This test only pins determinism and distribution shape.
        let h = Crc32cHashGenerator;
        let a = h.hash("alice");
        let b = h.hash("bob");
        assert_ne!(a, b);
    }
}
