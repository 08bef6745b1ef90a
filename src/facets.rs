use crate::models::{Bucket, BucketId};

pub const RUNTIME_BOUNDARIES: [i32; 5] = [0, 60, 90, 120, 180];
pub const RATING_BOUNDARIES: [i32; 5] = [0, 50, 70, 90, 100];

const OTHER: &str = "other";

/// Counts values into `[b[i], b[i + 1])` buckets labelled by their lower
/// boundary. Missing and out-of-range values go to `"other"`. Empty buckets
/// are left out.
pub fn bucketize(values: impl IntoIterator<Item = Option<i32>>, boundaries: &[i32]) -> Vec<Bucket> {
    let mut counts = vec![0u64; boundaries.len().saturating_sub(1)];
    let mut other = 0u64;

    for value in values {
        let slot = value.and_then(|v| boundaries.windows(2).position(|w| w[0] <= v && v < w[1]));
        match slot {
            Some(i) => counts[i] += 1,
            None => other += 1,
        }
    }

    let mut buckets: Vec<Bucket> = boundaries
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(lower, count)| Bucket { id: BucketId::Boundary(*lower), count })
        .collect();

    if other > 0 {
        buckets.push(Bucket { id: BucketId::Label(OTHER), count: other });
    }

    buckets
}
