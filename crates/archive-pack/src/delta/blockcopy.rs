use crate::PackError;

use super::apply::apply_delta_inner;
use super::compute::compute_delta;
use super::DeltaAlgorithm;

/// The one delta algorithm this engine ships: a block-hash copy/insert
/// diff, registered under the configuration name `"bsdiff"`. Other names
/// (`xdelta`, content-defined chunking, …) are declared extension points in
/// spec §4.2 but are out of scope here.
pub struct BlockCopyDelta;

impl BlockCopyDelta {
    pub const ID: u8 = 1;
}

impl DeltaAlgorithm for BlockCopyDelta {
    fn id(&self) -> u8 {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "bsdiff"
    }

    fn compute(&self, base: &[u8], target: &[u8]) -> Result<Vec<u8>, PackError> {
        Ok(compute_delta(base, target))
    }

    fn apply(&self, base: &[u8], delta: &[u8]) -> Result<Vec<u8>, PackError> {
        apply_delta_inner(base, delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_law() {
        let algo = BlockCopyDelta;
        let base = b"abcdefghijklmnopqrstuvwxyz".repeat(8);
        let target = {
            let mut t = base.clone();
            t.extend_from_slice(b"a distinctive suffix");
            t
        };
        let delta = algo.compute(&base, &target).unwrap();
        assert_eq!(algo.apply(&base, &delta).unwrap(), target);
    }
}
