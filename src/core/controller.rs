//! Button state decoding
//! This module turns the 8-bit input mask carried by the button characteristic
//! into per-bit edges.

use serde::Serialize;

/// A bit that changed between two consecutive masks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputEdge {
    /// Bit position, 0 is the least significant bit
    pub bit: u8,
    /// New level of the bit; `true` is a rising edge
    pub value: bool,
}

/// Result of feeding one mask into the decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputUpdate {
    /// Bits that differ from the previous mask
    pub diff: u8,
    /// The new mask
    pub bits: u8,
    /// One edge per set bit of `diff`, lowest bit first
    pub edges: Vec<InputEdge>,
}

impl InputUpdate {
    /// Current level of `bit`, whether or not it changed
    pub fn level(&self, bit: u8) -> bool {
        bit < 8 && (self.bits >> bit) & 1 == 1
    }

    /// Current level of all eight bits, bit 0 first
    pub fn levels(&self) -> [bool; 8] {
        std::array::from_fn(|i| self.level(i as u8))
    }

    /// The edge of `bit`, if it changed
    pub fn edge(&self, bit: u8) -> Option<InputEdge> {
        self.edges.iter().find(|e| e.bit == bit).copied()
    }
}

/// Diffs each new input mask against the previous one
#[derive(Debug, Clone, Default)]
pub struct InputDecoder {
    previous: u8,
}

impl InputDecoder {
    /// Creates a decoder whose previous state is all bits released
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> u8 {
        self.previous
    }

    /// Feeds a new mask and returns the edges relative to the previous one
    pub fn update(&mut self, bits: u8) -> InputUpdate {
        let diff = self.previous ^ bits;
        let edges = (0..8u8)
            .filter(|bit| (diff >> bit) & 1 == 1)
            .map(|bit| InputEdge {
                bit,
                value: (bits >> bit) & 1 == 1,
            })
            .collect();
        self.previous = bits;

        InputUpdate { diff, bits, edges }
    }

    /// Decodes the first byte of a notification payload; empty payloads are ignored
    pub fn parse_data(&mut self, data: &[u8]) -> Option<InputUpdate> {
        data.first().map(|&bits| self.update(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(update: &InputUpdate) -> Vec<(u8, bool)> {
        update.edges.iter().map(|e| (e.bit, e.value)).collect()
    }

    #[test]
    fn reports_rising_and_falling_edges() {
        let mut decoder = InputDecoder::new();
        let steps: Vec<InputUpdate> = [0x00, 0x01, 0x01, 0x03, 0x00]
            .into_iter()
            .map(|v| decoder.update(v))
            .collect();

        assert!(steps[0].edges.is_empty());
        assert_eq!(edges(&steps[1]), vec![(0, true)]);
        assert!(steps[2].edges.is_empty());
        assert_eq!(edges(&steps[3]), vec![(1, true)]);
        assert_eq!(edges(&steps[4]), vec![(0, false), (1, false)]);
        assert_eq!(decoder.previous(), 0x00);
    }

    #[test]
    fn levels_are_reported_without_edges() {
        let mut decoder = InputDecoder::new();
        decoder.update(0b1000_0001);
        let update = decoder.update(0b1000_0001);

        assert_eq!(update.diff, 0);
        assert_eq!(
            update.levels(),
            [true, false, false, false, false, false, false, true]
        );
        assert!(update.edge(0).is_none());
    }

    #[test]
    fn parse_data_uses_first_byte() {
        let mut decoder = InputDecoder::new();

        assert!(decoder.parse_data(&[]).is_none());
        let update = decoder.parse_data(&[0x04, 0xff]).unwrap();
        assert_eq!(update.edge(2), Some(InputEdge { bit: 2, value: true }));
        assert_eq!(decoder.previous(), 0x04);
    }
}
