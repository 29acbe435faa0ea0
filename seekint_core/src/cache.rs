use crate::element::IntBlock;

/// Single-slot cache of the most recently decoded block.
///
/// The slot is either empty or holds the complete decoded form of exactly
/// one block, keyed by its sequence number.
#[derive(Debug, Default)]
pub struct BlockCache {
    slot: Option<(u64, IntBlock)>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the resident block, if any.
    pub fn resident(&self) -> Option<u64> {
        self.slot.as_ref().map(|(seq, _)| *seq)
    }

    pub fn get(&self, seq: u64) -> Option<&IntBlock> {
        match &self.slot {
            Some((resident, block)) if *resident == seq => Some(block),
            _ => None,
        }
    }

    /// Replace the resident block, evicting the previous one.
    pub fn insert(&mut self, seq: u64, block: IntBlock) {
        self.slot = Some((seq, block));
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}
