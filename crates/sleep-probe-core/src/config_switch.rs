//! Boot-time DIP switch decoding.

/// Number of switch inputs (D0..D3).
pub const SWITCH_BITS: usize = 4;

/// Turns the pin levels into the selected test number.
///
/// `levels[0]` is D0 and becomes bit 0.
pub fn decode(levels: [bool; SWITCH_BITS]) -> u8 {
    levels
        .iter()
        .enumerate()
        .fold(0, |acc, (bit, &high)| if high { acc | (1 << bit) } else { acc })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_combination_decodes_to_its_binary_value() {
        for value in 0u8..16 {
            let levels = [
                value & 0b0001 != 0,
                value & 0b0010 != 0,
                value & 0b0100 != 0,
                value & 0b1000 != 0,
            ];
            assert_eq!(decode(levels), value);
        }
    }

    #[test]
    fn first_pin_is_least_significant() {
        assert_eq!(decode([true, false, false, false]), 1);
        assert_eq!(decode([false, false, false, true]), 8);
    }
}
