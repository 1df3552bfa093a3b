//! Pluggable partition selection, per §4.2.

use crate::message::PartitionKey;

/// Maps (key, partitionCount) to a partition index. The returned value need
/// not already be reduced modulo `partition_count`; `BusCore::determine_partition`
/// does that.
pub trait PartitionSelector: Send + Sync + std::fmt::Debug {
    fn select_partition(&self, key: &PartitionKey, partition_count: u32) -> i64;
}

/// The default selector: hashes the key with xxh32 (the teacher's own
/// hashing crate of choice), remapping `i32::MIN` to 0 to avoid overflow
/// under `abs`, per §4.2 and §8 scenario 6.
#[derive(Debug, Default)]
pub struct DefaultPartitionSelector;

impl DefaultPartitionSelector {
    pub fn hash_key(key: &str) -> i32 {
        xxhash_rust::xxh32::xxh32(key.as_bytes(), 0) as i32
    }
}

/// Remaps a signed 32-bit hash to a non-negative `i64`, substituting 0 for
/// `i32::MIN` since `i32::MIN.abs()` overflows, per §4.2.
fn remap_hash(hash: i32) -> i64 {
    if hash == i32::MIN {
        0
    } else {
        hash.unsigned_abs() as i64
    }
}

impl PartitionSelector for DefaultPartitionSelector {
    fn select_partition(&self, key: &PartitionKey, _partition_count: u32) -> i64 {
        remap_hash(Self::hash_key(key.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_always_selects_same_partition() {
        let selector = DefaultPartitionSelector;
        let key = PartitionKey::from("abc");
        let first = selector.select_partition(&key, 4);
        let second = selector.select_partition(&key, 4);
        assert_eq!(first, second);
        assert!(first >= 0);
    }

    #[test]
    fn min_int_hash_is_remapped_to_zero() {
        assert_eq!(remap_hash(i32::MIN), 0);
        assert_eq!(remap_hash(-5), 5);
        assert_eq!(remap_hash(5), 5);
    }
}
