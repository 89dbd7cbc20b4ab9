//! Property-based checks for the quantified invariants in spec.md §8,
//! using `proptest` for the sorted-writer and fan-out guarantees.

use std::collections::BTreeSet;

use archive_hash::{BlobId, HashFormat};
use archive_pack::index::{write_index, IndexEntry};
use archive_pack::{EntryType, Generation};
use proptest::prelude::*;

fn arbitrary_hash() -> impl Strategy<Value = [u8; 32]> {
    proptest::collection::vec(any::<u8>(), 32).prop_map(|v| {
        let mut out = [0u8; 32];
        out.copy_from_slice(&v);
        out
    })
}

fn arbitrary_unique_sorted_hashes(max: usize) -> impl Strategy<Value = Vec<[u8; 32]>> {
    proptest::collection::vec(arbitrary_hash(), 1..=max).prop_map(|hashes| {
        let set: BTreeSet<[u8; 32]> = hashes.into_iter().collect();
        set.into_iter().collect()
    })
}

proptest! {
    /// ∀ index I: fanOut[b] equals the number of entries with hash[0] <= b,
    /// and fanOut[255] == entry_count.
    #[test]
    fn fan_out_matches_entry_distribution(hashes in arbitrary_unique_sorted_hashes(40)) {
        let dir = tempfile::tempdir().unwrap();
        let entries: Vec<IndexEntry> = hashes
            .iter()
            .enumerate()
            .map(|(i, bytes)| IndexEntry {
                hash: BlobId::from_bytes(HashFormat::Sha256, bytes).unwrap(),
                pack_offset: i as u64,
                compressed_size: 1,
                entry_type: EntryType::Full,
                base_offset: 0,
            })
            .collect();
        let checksum = BlobId::from_bytes(HashFormat::Sha256, &[0x42; 32]).unwrap();
        let path = write_index(dir.path(), Generation::V0, HashFormat::Sha256, &checksum, &entries).unwrap();
        let reader = archive_pack::index::IndexReader::open(&path, HashFormat::Sha256).unwrap();

        prop_assert_eq!(reader.fan_out()[255], entries.len() as u64);
        for b in 0u16..=255 {
            let expected = entries.iter().filter(|e| (e.hash.first_byte() as u16) <= b).count() as u64;
            prop_assert_eq!(reader.fan_out()[b as usize], expected);
        }
    }

    /// ∀ index I: a lookup for every written hash succeeds and returns its
    /// recorded offset; a lookup for a hash never written returns nothing.
    #[test]
    fn every_written_hash_is_found_by_lookup(hashes in arbitrary_unique_sorted_hashes(40)) {
        let dir = tempfile::tempdir().unwrap();
        let entries: Vec<IndexEntry> = hashes
            .iter()
            .enumerate()
            .map(|(i, bytes)| IndexEntry {
                hash: BlobId::from_bytes(HashFormat::Sha256, bytes).unwrap(),
                pack_offset: (i as u64) * 17,
                compressed_size: 3,
                entry_type: EntryType::Full,
                base_offset: 0,
            })
            .collect();
        let checksum = BlobId::from_bytes(HashFormat::Sha256, &[0x7a; 32]).unwrap();
        let path = write_index(dir.path(), Generation::V0, HashFormat::Sha256, &checksum, &entries).unwrap();
        let reader = archive_pack::index::IndexReader::open(&path, HashFormat::Sha256).unwrap();

        for entry in &entries {
            let hit = reader.lookup(&entry.hash).expect("written hash must be found");
            prop_assert_eq!(hit.pack_offset, entry.pack_offset);
        }
    }

    /// Sorted-writer rejection: feeding unsorted or duplicate hashes fails
    /// before any output byte leaves the writer (no file appears on disk).
    #[test]
    fn unsorted_or_duplicate_input_is_rejected_before_any_write(
        hashes in proptest::collection::vec(arbitrary_hash(), 2..20)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut entries: Vec<IndexEntry> = hashes
            .iter()
            .enumerate()
            .map(|(i, bytes)| IndexEntry {
                hash: BlobId::from_bytes(HashFormat::Sha256, bytes).unwrap(),
                pack_offset: i as u64,
                compressed_size: 1,
                entry_type: EntryType::Full,
                base_offset: 0,
            })
            .collect();
        // Force a guaranteed violation: duplicate the first entry at the end.
        entries.push(entries[0]);

        let checksum = BlobId::from_bytes(HashFormat::Sha256, &[0x11; 32]).unwrap();
        let result = write_index(dir.path(), Generation::V0, HashFormat::Sha256, &checksum, &entries);
        prop_assert!(result.is_err());
        prop_assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
