//! Active playlist bank as a one-hot ring over the four bank LEDs

use crate::protocol::Bank;

/// One-hot rotation over the 4 bank slots
///
/// The ring is the only owner of the bank selection and the bank LEDs are
/// rendered from it, never read back. It starts with one slot lit and
/// rotation only permutes slots, so exactly one slot is lit at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankRing {
    slots: [bool; 4],
}

impl BankRing {
    /// Ring with `bank` active
    pub fn new(bank: Bank) -> Self {
        let mut slots = [false; 4];
        slots[bank.index()] = true;
        Self { slots }
    }

    /// Currently active bank
    pub fn active(&self) -> Bank {
        Bank::from_index(self.slots.iter().position(|s| *s).unwrap_or(0))
    }

    /// Rotate one position forward, or backward when `reverse`
    pub fn rotate(&mut self, reverse: bool) -> Bank {
        if reverse {
            self.slots.rotate_left(1);
        } else {
            self.slots.rotate_right(1);
        }
        self.active()
    }
}

impl Default for BankRing {
    fn default() -> Self {
        Self::new(Bank::A)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lit(ring: &BankRing) -> usize {
        ring.slots.iter().filter(|s| **s).count()
    }

    #[test]
    fn test_forward_and_reverse() {
        let mut ring = BankRing::default();
        assert_eq!(ring.rotate(false), Bank::B);
        assert_eq!(ring.rotate(false), Bank::C);
        assert_eq!(ring.rotate(true), Bank::B);
        assert_eq!(ring.rotate(true), Bank::A);
        assert_eq!(ring.rotate(true), Bank::D);
    }

    #[test]
    fn test_new_lights_one_slot() {
        let ring = BankRing::new(Bank::C);
        assert_eq!(ring.slots, [false, false, true, false]);
        assert_eq!(ring.active(), Bank::C);
    }

    proptest! {
        #[test]
        fn four_forward_rotations_are_identity(start in 0usize..4) {
            let bank = Bank::from_index(start);
            let mut ring = BankRing::new(bank);
            for _ in 0..4 {
                ring.rotate(false);
            }
            prop_assert_eq!(ring.active(), bank);
        }

        #[test]
        fn forward_then_reverse_is_identity(start in 0usize..4) {
            let bank = Bank::from_index(start);
            let mut ring = BankRing::new(bank);
            ring.rotate(false);
            ring.rotate(true);
            prop_assert_eq!(ring.active(), bank);
        }

        #[test]
        fn ring_stays_one_hot(start in 0usize..4, moves in proptest::collection::vec(any::<bool>(), 0..20)) {
            let mut ring = BankRing::new(Bank::from_index(start));
            for reverse in moves {
                ring.rotate(reverse);
                prop_assert_eq!(lit(&ring), 1);
            }
        }
    }
}
