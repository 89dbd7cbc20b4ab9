//! Base selector (spec §4.6): proposes which blobs should be encoded as
//! deltas against which other blob in the same pack.
//!
//! The specified strategy is size-bucket selection: blobs outside the
//! configured size range are dropped, the remainder sorted by size
//! ascending, then swept into maximal groups where every member is within
//! `size_ratio` of the group's smallest member. Each group of two or more
//! assigns its largest member as the base for everyone else in the group.
//! Singleton groups stay full. The selector never proposes a chain (a base
//! is always a group's largest member, never itself assigned elsewhere) and
//! never proposes self-assignment.
//!
//! Other strategies (content-type-aware, history-aware) are declared
//! extension points by spec §4.6 but are out of scope for this engine.

use std::collections::HashMap;

use archive_hash::BlobId;

/// One blob as the selector sees it: its id and its size in bytes.
pub type BlobSet = Vec<(BlobId, u64)>;

pub struct DeltaSelectionConfig {
    pub min_blob_size: u64,
    pub max_blob_size: u64,
    pub size_ratio: f64,
}

/// Propose `blobIndex -> baseIndex` delta assignments over `blobs` (indices
/// into the caller's original ordering).
pub fn select_bases(blobs: &BlobSet, config: &DeltaSelectionConfig) -> HashMap<usize, usize> {
    let mut candidates: Vec<usize> = (0..blobs.len())
        .filter(|&i| blobs[i].1 >= config.min_blob_size && blobs[i].1 <= config.max_blob_size)
        .collect();
    candidates.sort_by_key(|&i| blobs[i].1);

    let mut assignments = HashMap::new();
    let mut i = 0;
    while i < candidates.len() {
        let start_size = blobs[candidates[i]].1 as f64;
        let threshold = start_size * config.size_ratio;

        let mut j = i;
        while j + 1 < candidates.len() && (blobs[candidates[j + 1]].1 as f64) <= threshold {
            j += 1;
        }

        if j > i {
            // candidates[i..=j] is sorted ascending by size, so the group's
            // largest member is the last one.
            let base = candidates[j];
            for &member in &candidates[i..j] {
                assignments.insert(member, base);
            }
        }

        i = j + 1;
    }

    assignments
}
