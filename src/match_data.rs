//! Per-matcher scratch space holding the offsets of the last result

use crate::engine::UNSET;

/// Offset vector of `2 * (groups + 1)` slots
///
/// Slots `2g` and `2g + 1` hold the start and end byte offsets of group `g`,
/// or [`UNSET`] when the group did not participate. The size is fixed at
/// allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchData {
    slots: Box<[usize]>,
}

impl MatchData {
    /// Scratch space for a pattern with `groups` capture groups
    pub fn new(groups: usize) -> Self {
        Self {
            slots: vec![UNSET; 2 * (groups + 1)].into_boxed_slice(),
        }
    }

    /// Number of capture groups this scratch was sized for
    pub fn groups(&self) -> usize {
        self.slots.len() / 2 - 1
    }

    /// Offsets of group `group`, if it is in range and set
    pub fn pair(&self, group: usize) -> Option<(usize, usize)> {
        let start = *self.slots.get(2 * group)?;
        let end = *self.slots.get(2 * group + 1)?;
        (start != UNSET && end != UNSET).then_some((start, end))
    }

    /// Forget every offset
    pub fn clear(&mut self) {
        self.slots.fill(UNSET);
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.slots
    }

    pub fn as_mut_slice(&mut self) -> &mut [usize] {
        &mut self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_and_unset() {
        let data = MatchData::new(2);
        assert_eq!(data.as_slice().len(), 6);
        assert_eq!(data.groups(), 2);
        assert!(data.as_slice().iter().all(|&slot| slot == UNSET));
        assert_eq!(data.pair(0), None);
    }

    #[test]
    fn pairs_are_bounds_checked() {
        let mut data = MatchData::new(1);
        data.as_mut_slice().copy_from_slice(&[0, 4, 1, 2]);
        assert_eq!(data.pair(0), Some((0, 4)));
        assert_eq!(data.pair(1), Some((1, 2)));
        assert_eq!(data.pair(2), None);

        data.clear();
        assert_eq!(data.pair(1), None);
    }
}
