/// Hands out dense, zero-based identifiers in call order.
///
/// One allocator is owned by each scan session (nodes) and one by the graph assembler (edges);
/// identifiers are never shared between scans, reused, or skipped.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next identifier. Call exactly once per emitted item, at emission time.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of identifiers handed out so far.
    pub fn issued(&self) -> usize {
        self.next as usize
    }
}
