use crate::PackError;

use super::read_varint;

/// Reconstruct the target bytes from `base` and a patch produced by
/// [`super::compute::compute_delta`]. Validates the declared source size
/// against `base`, bounds-checks every copy instruction, and validates the
/// declared target size against the reconstructed output.
pub(super) fn apply_delta_inner(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, PackError> {
    let mut pos = 0;
    let source_size = read_varint(delta, &mut pos)? as usize;
    let target_size = read_varint(delta, &mut pos)? as usize;

    if source_size != base.len() {
        return Err(PackError::DeltaApplyError(format!(
            "source size mismatch: delta expects {source_size}, base has {}",
            base.len()
        )));
    }

    let mut out = Vec::with_capacity(target_size);

    while pos < delta.len() {
        let opcode = delta[pos];
        pos += 1;

        if opcode & 0x80 != 0 {
            let mut offset: u64 = 0;
            let mut size: u64 = 0;
            for i in 0..4 {
                if opcode & (1 << i) != 0 {
                    let byte = *delta.get(pos).ok_or_else(|| {
                        PackError::DeltaApplyError("truncated copy offset".into())
                    })?;
                    pos += 1;
                    offset |= (byte as u64) << (8 * i);
                }
            }
            for i in 0..3 {
                if opcode & (1 << (4 + i)) != 0 {
                    let byte = *delta
                        .get(pos)
                        .ok_or_else(|| PackError::DeltaApplyError("truncated copy size".into()))?;
                    pos += 1;
                    size |= (byte as u64) << (8 * i);
                }
            }

            let offset = offset as usize;
            let size = size as usize;
            let in_bounds = match offset.checked_add(size) {
                Some(end) => end <= base.len(),
                None => false,
            };
            if !in_bounds {
                return Err(PackError::DeltaApplyError(format!(
                    "copy out of bounds: offset={offset}, size={size}, base_len={}",
                    base.len()
                )));
            }
            out.extend_from_slice(&base[offset..offset + size]);
        } else if opcode == 0 {
            return Err(PackError::DeltaApplyError("insert opcode 0 is invalid".into()));
        } else {
            let len = opcode as usize;
            let end = pos + len;
            if end > delta.len() {
                return Err(PackError::DeltaApplyError("truncated insert payload".into()));
            }
            out.extend_from_slice(&delta[pos..end]);
            pos = end;
        }
    }

    if out.len() != target_size {
        return Err(PackError::DeltaApplyError(format!(
            "target size mismatch: delta declares {target_size}, produced {}",
            out.len()
        )));
    }

    Ok(out)
}
