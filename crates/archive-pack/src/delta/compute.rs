use std::collections::HashMap;

use super::{encode_copy, encode_insert, write_varint};

const BLOCK_SIZE: usize = 16;
const MAX_INSERT: usize = 127;
const MAX_COPY_SIZE: u64 = 0xff_ffff;

/// Build a self-contained patch turning `source` into `target`, using a
/// block-hash index over `source` to find copyable runs (same shape as a
/// real packfile diff-delta, simplified: fixed-size non-overlapping blocks,
/// first occurrence wins).
pub(super) fn compute_delta(source: &[u8], target: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    write_varint(&mut out, source.len() as u64);
    write_varint(&mut out, target.len() as u64);

    let blocks = index_blocks(source);

    let mut pending: Vec<u8> = Vec::new();
    let mut i = 0;
    while i < target.len() {
        let matched = find_match(source, target, &blocks, i);
        match matched {
            Some((src_off, len)) if len >= BLOCK_SIZE => {
                flush_inserts(&mut out, &mut pending);
                emit_copy(&mut out, src_off as u64, len as u64);
                i += len;
            }
            _ => {
                pending.push(target[i]);
                if pending.len() == MAX_INSERT {
                    flush_inserts(&mut out, &mut pending);
                }
                i += 1;
            }
        }
    }
    flush_inserts(&mut out, &mut pending);

    out
}

fn index_blocks(source: &[u8]) -> HashMap<&[u8], usize> {
    let mut map = HashMap::new();
    let mut offset = 0;
    while offset + BLOCK_SIZE <= source.len() {
        let block = &source[offset..offset + BLOCK_SIZE];
        map.entry(block).or_insert(offset);
        offset += BLOCK_SIZE;
    }
    map
}

fn find_match(
    source: &[u8],
    target: &[u8],
    blocks: &HashMap<&[u8], usize>,
    target_pos: usize,
) -> Option<(usize, usize)> {
    if target_pos + BLOCK_SIZE > target.len() {
        return None;
    }
    let key = &target[target_pos..target_pos + BLOCK_SIZE];
    let &src_off = blocks.get(key)?;
    let len = extend_match(source, target, src_off, target_pos);
    Some((src_off, len))
}

fn extend_match(source: &[u8], target: &[u8], src_off: usize, target_pos: usize) -> usize {
    let max = (source.len() - src_off).min(target.len() - target_pos);
    let mut len = 0;
    while len < max && source[src_off + len] == target[target_pos + len] {
        len += 1;
    }
    len
}

fn flush_inserts(out: &mut Vec<u8>, pending: &mut Vec<u8>) {
    if !pending.is_empty() {
        encode_insert(out, pending);
        pending.clear();
    }
}

fn emit_copy(out: &mut Vec<u8>, mut offset: u64, mut size: u64) {
    while size > 0 {
        let chunk = size.min(MAX_COPY_SIZE);
        encode_copy(out, offset, chunk);
        offset += chunk;
        size -= chunk;
    }
}
