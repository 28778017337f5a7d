/// Running text buffer fed by text deltas.
#[derive(Debug, Default, Clone)]
pub struct TextAccumulator {
    buffer: String,
    deltas: usize,
}

impl TextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return everything accumulated so far.
    pub fn push(&mut self, delta: &str) -> &str {
        self.buffer.push_str(delta);
        self.deltas += 1;
        &self.buffer
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn deltas(&self) -> usize {
        self.deltas
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_in_order() {
        let mut acc = TextAccumulator::new();
        assert_eq!(acc.push("Hel"), "Hel");
        assert_eq!(acc.push("lo"), "Hello");
        assert_eq!(acc.deltas(), 2);
    }
}
