//! Shard range segments and the routing table they form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::element::{ElementClass, OperationKind, RoutingKey};
use crate::error::Error;

/// One endpoint serving a contiguous range of the hash domain.
///
/// `hash_range_start` is inclusive; the range extends up to (but not
/// including) the next segment's `hash_range_start`, wrapping to `+inf` for
/// the last segment in a `(class, kind)` group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRangeSegment {
    pub class: ElementClass,
    pub kind: OperationKind,
    pub hash_range_start: i32,
    pub endpoint_uri: String,
    /// Stable, human-readable identifier for this endpoint. Appears verbatim
    /// in wrapped error messages and metric labels.
    pub description: String,
}

/// One group of segments sharing a `(class, kind)` key, sorted by
/// `hash_range_start` and partitioning the full `i32` domain.
#[derive(Debug, Clone, Default)]
struct RangeGroup {
    /// Sorted ascending by `hash_range_start`. Each distinct `hash_range_start`
    /// may carry more than one segment only for `Query` (replicas).
    starts: Vec<i32>,
    endpoints: Vec<Vec<ShardRangeSegment>>,
}

impl RangeGroup {
    fn from_segments(
        class: ElementClass,
        kind: OperationKind,
        mut segments: Vec<ShardRangeSegment>,
    ) -> Result<Self, Error> {
        if segments.is_empty() {
            return Err(Error::EmptyRange { class, kind });
        }

        segments.sort_by_key(|s| s.hash_range_start);

        let mut starts: Vec<i32> = Vec::new();
        let mut endpoints: Vec<Vec<ShardRangeSegment>> = Vec::new();

        for segment in segments {
            match starts.last() {
                Some(&last) if last == segment.hash_range_start => {
                    endpoints.last_mut().unwrap().push(segment);
                }
                Some(&last) if last > segment.hash_range_start => {
                    return Err(Error::Overlap {
                        class,
                        kind,
                        start: segment.hash_range_start,
                    });
                }
                _ => {
                    starts.push(segment.hash_range_start);
                    endpoints.push(vec![segment]);
                }
            }
        }

        if starts[0] != i32::MIN {
            return Err(Error::BadStart { class, kind });
        }

        for (start, group) in starts.iter().zip(endpoints.iter()) {
            match kind {
                OperationKind::Event if group.len() > 1 => {
                    return Err(Error::MultipleEventEndpoints {
                        class,
                        start: *start,
                        count: group.len(),
                    });
                }
                OperationKind::Event if group.is_empty() => {
                    return Err(Error::NoEventEndpoint { class, start: *start });
                }
                OperationKind::Query if group.is_empty() => {
                    return Err(Error::NoQueryEndpoint {
                        class,
                        kind,
                        start: *start,
                    });
                }
                _ => {}
            }
        }

        Ok(Self { starts, endpoints })
    }

    /// Binary search for the segment group owning `hash`.
    fn lookup(&self, hash: i32) -> &[ShardRangeSegment] {
        let idx = match self.starts.binary_search(&hash) {
            Ok(i) => i,
            Err(0) => unreachable!("first start is always i32::MIN"),
            Err(i) => i - 1,
        };
        &self.endpoints[idx]
    }

    fn all_segments(&self) -> impl Iterator<Item = &ShardRangeSegment> {
        self.endpoints.iter().flatten()
    }
}

/// The authoritative routing table: for every `(class, kind)`, an ordered,
/// gap-free, overlap-free partition of the `i32` hash domain into endpoints.
///
/// Constructed once by [`crate::loader::load_segments`] (or directly from a
/// `Vec<ShardRangeSegment>` via [`ShardConfigurationSet::new`]) and installed
/// into `accessgate-core`'s `ShardClientManager` via `RefreshConfiguration`.
/// Instances are immutable; a refresh builds a brand new set and swaps it in.
#[derive(Debug, Clone, Default)]
pub struct ShardConfigurationSet {
    groups: BTreeMap<RoutingKey, RangeGroup>,
}

impl ShardConfigurationSet {
    /// Validate and build a configuration set from a flat segment list.
    ///
    /// Rejects the whole payload (not just the offending group) if any
    /// `(class, kind)` group fails the partition invariant, matching
    /// "a refresh whose payload fails this check is rejected; the active
    /// snapshot is unchanged".
    pub fn new(segments: Vec<ShardRangeSegment>) -> Result<Self, Error> {
        let mut by_key: BTreeMap<RoutingKey, Vec<ShardRangeSegment>> = BTreeMap::new();
        for segment in segments {
            by_key
                .entry((segment.class, segment.kind))
                .or_default()
                .push(segment);
        }

        let mut groups = BTreeMap::new();
        for ((class, kind), segs) in by_key {
            groups.insert((class, kind), RangeGroup::from_segments(class, kind, segs)?);
        }

        Ok(Self { groups })
    }

    /// O(log n) lookup of the segment(s) owning `hash` for `(class, kind)`.
    /// Returns an empty slice if nothing is configured for that key.
    pub fn lookup(&self, class: ElementClass, kind: OperationKind, hash: i32) -> &[ShardRangeSegment] {
        self.groups
            .get(&(class, kind))
            .map(|group| group.lookup(hash))
            .unwrap_or(&[])
    }

    /// Distinct endpoints configured for `(class, kind)`, in declaration
    /// order (stable within one snapshot, unspecified across snapshots).
    pub fn all_segments(&self, class: ElementClass, kind: OperationKind) -> Vec<&ShardRangeSegment> {
        self.groups
            .get(&(class, kind))
            .map(|group| group.all_segments().collect())
            .unwrap_or_default()
    }

    /// True if this set has no ranges configured at all for `(class, kind)`.
    pub fn is_empty_for(&self, class: ElementClass, kind: OperationKind) -> bool {
        !self.groups.contains_key(&(class, kind))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn segment(class: ElementClass, kind: OperationKind, start: i32, desc: &str) -> ShardRangeSegment {
        ShardRangeSegment {
            class,
            kind,
            hash_range_start: start,
            endpoint_uri: format!("http://{desc}"),
            description: desc.to_string(),
        }
    }

    #[test]
    fn test_two_way_partition_s1() {
        let set = ShardConfigurationSet::new(vec![
            segment(ElementClass::User, OperationKind::Event, i32::MIN, "UA"),
            segment(ElementClass::User, OperationKind::Event, 0, "UB"),
        ])
        .unwrap();

        let at_neg = set.lookup(ElementClass::User, OperationKind::Event, -100);
        assert_eq!(at_neg.len(), 1);
        assert_eq!(at_neg[0].description, "UA");

        let at_pos = set.lookup(ElementClass::User, OperationKind::Event, 200);
        assert_eq!(at_pos.len(), 1);
        assert_eq!(at_pos[0].description, "UB");
    }

    #[test]
    fn test_query_replicas_allowed() {
        let set = ShardConfigurationSet::new(vec![
            segment(ElementClass::Group, OperationKind::Query, i32::MIN, "G1a"),
            segment(ElementClass::Group, OperationKind::Query, i32::MIN, "G1b"),
        ])
        .unwrap();

        let owners = set.lookup(ElementClass::Group, OperationKind::Query, 42);
        assert_eq!(owners.len(), 2);
    }

    #[test]
    fn test_event_multiple_endpoints_rejected() {
        let err = ShardConfigurationSet::new(vec![
            segment(ElementClass::User, OperationKind::Event, i32::MIN, "UA"),
            segment(ElementClass::User, OperationKind::Event, i32::MIN, "UB"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::MultipleEventEndpoints { .. }));
    }

    #[test]
    fn test_missing_min_start_rejected() {
        let err = ShardConfigurationSet::new(vec![segment(
            ElementClass::User,
            OperationKind::Event,
            0,
            "UA",
        )])
        .unwrap_err();
        assert!(matches!(err, Error::BadStart { .. }));
    }

    #[test]
    fn test_lookup_missing_key_is_empty_not_error() {
        let set = ShardConfigurationSet::default();
        assert!(set
            .lookup(ElementClass::User, OperationKind::Event, 0)
            .is_empty());
        assert!(set.is_empty_for(ElementClass::User, OperationKind::Event));
    }
}
