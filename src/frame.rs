// src/frame.rs
//
// Per-frame record in the master catalog: which droplets the scan pass
// found in this frame, in detection order.

#[derive(Debug, Clone, Default)]
pub struct FrameRecord {
    pub index: usize,
    /// Initial ids of the droplets detected in this frame, in scan order.
    pub droplet_ids: Vec<u32>,
}

impl FrameRecord {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            droplet_ids: Vec::new(),
        }
    }

    pub fn droplet_count(&self) -> usize {
        self.droplet_ids.len()
    }
}
