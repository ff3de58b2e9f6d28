// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
power-of-two arithmetic for the sort network.
*/

/// Smallest power of two that is `>= count`.
///
/// Returns `None` when the result does not fit in a `usize`.  `0` pads to `1`,
/// although the sorter never asks for that.
pub fn padded_count(count: usize) -> Option<usize> {
    count.checked_next_power_of_two()
}

/// Largest power of two that is `<= value`, or `0` for `0`.
pub fn floor_power_of_two(value: usize) -> usize {
    if value == 0 {
        0
    } else {
        1 << value.ilog2()
    }
}

/// log2 of a power of two.
pub fn log2_exact(power_of_two: usize) -> u32 {
    debug_assert!(power_of_two.is_power_of_two());
    power_of_two.trailing_zeros()
}
