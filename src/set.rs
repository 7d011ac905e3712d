/// A dense set over `0..size` with O(1) insert, lookup and clear.
///
/// Clearing bumps a generation counter instead of touching the storage; the
/// storage is rewritten only on the (practically unreachable) generation
/// overflow.
pub(crate) struct FastSet {
    data: Vec<u32>,
    generation: u32,
}

impl FastSet {
    pub(crate) fn new(size: usize) -> Self {
        Self { data: vec![u32::MAX; size], generation: 0 }
    }

    pub(crate) fn clear(&mut self) {
        let (generation, overflow) = self.generation.overflowing_add(1);
        self.generation = generation;
        if overflow {
            self.data.fill(u32::MAX);
        }
    }

    pub(crate) fn set(&mut self, x: impl Into<usize>) {
        self.data[x.into()] = self.generation;
    }

    pub(crate) fn get(&self, x: impl Into<usize>) -> bool {
        self.data[x.into()] == self.generation
    }
}
