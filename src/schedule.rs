// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The bitonic pass schedule.

A bitonic network over `n = 2^m` elements has `m(m+1)/2` compare-exchange stages.  Every stage
needs a barrier between it and the next, which on a GPU means a separate dispatch.

When the working set of several consecutive stages fits inside one synchronized group, those
stages can run in a single dispatch with group-local barriers instead.  This schedule issues three
kinds of passes:

| Kind                   | Distance                    | Stages per dispatch |
|------------------------|-----------------------------|---------------------|
| [`PassKind::First`]    | every distance `<= unit`    | all stages of blocks up to `2*unit` |
| [`PassKind::General`]  | one distance `> unit`       | 1 |
| [`PassKind::Final`]    | `distance, distance/2, …, 1`| `log2(distance)+1` |

For `n = 2^m` and `unit = 2^k` this issues `(m-k)(m-k+1)/2` dispatches.

# Pair indexing

Lane `t` of a pass at `distance` compares two slots inside a chunk of `2*distance` elements.  When
`2*distance` equals the block being merged, the lane compares its slot with the mirrored slot of the
chunk; otherwise it compares with the slot `distance` above it.  Since the mirror step reverses the
second half of every block, all compare-exchanges point the same direction and no per-block
direction flag is needed.

```
use bitonic_sort::schedule::{Fusion, PassKind, Schedule};
use bitonic_sort::SortOrder;

let schedule = Schedule::new(8, 2, Fusion::Enabled, SortOrder::Ascending);
let kinds: Vec<PassKind> = schedule.map(|p| p.kind).collect();
assert_eq!(kinds, vec![PassKind::First, PassKind::General, PassKind::Final]);
```
*/

use crate::SortOrder;
use crate::bittricks::log2_exact;

/// Which kind of dispatch a pass is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Fused local sort of every `2*unit_size` block.
    First,
    /// One compare-exchange stage across the whole buffer.
    General,
    /// Fused half-cleaners from `distance` down to 1.
    Final,
}

/// Whether stages may be fused into group-local dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fusion {
    /// Fuse first/final stages when the backend reports a group size.
    #[default]
    Enabled,
    /// Issue one general pass per stage.
    Disabled,
}

/// One dispatch of the sort network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassDescriptor {
    pub kind: PassKind,
    /// Number of compare-exchange lanes, `padded_count / 2`.
    pub grid_size: usize,
    /// Lanes per synchronized group.
    pub unit_size: usize,
    /// Size of the bitonic blocks being merged.
    pub block_size: usize,
    /// Comparison distance.  For fused passes, the largest distance fused.
    pub distance: usize,
    pub order: SortOrder,
}

impl PassDescriptor {
    /// Whether this pass runs several stages with group-local barriers.
    pub fn is_fused(&self) -> bool {
        !matches!(self.kind, PassKind::General)
    }

    /// Number of network stages this pass performs.
    pub fn stage_count(&self) -> usize {
        match self.kind {
            PassKind::General => 1,
            PassKind::Final => log2_exact(self.distance) as usize + 1,
            PassKind::First => {
                let m = log2_exact(self.block_size) as usize;
                m * (m + 1) / 2
            }
        }
    }

    /// Number of synchronized groups the pass is dispatched as.
    pub fn group_count(&self) -> usize {
        self.grid_size.div_ceil(self.unit_size)
    }
}

/// Slots compared by `lane` at `distance` while merging blocks of `block_size`.
///
/// Returns `(low, high)` with `low < high`.  The smaller value (in sort order) belongs in `low`.
pub fn partner_slots(lane: usize, block_size: usize, distance: usize) -> (usize, usize) {
    let chunk = distance * 2;
    let base = (lane / distance) * chunk;
    let offset = lane % distance;
    let low = base + offset;
    let high = if chunk == block_size {
        base + chunk - 1 - offset
    } else {
        low + distance
    };
    (low, high)
}

/// The lane that owns `slot` at `distance` while merging blocks of `block_size`.
///
/// Inverse of [`partner_slots`]: both slots it returns map back to the same lane.
pub fn lane_for_slot(slot: usize, block_size: usize, distance: usize) -> usize {
    let chunk = distance * 2;
    let within = slot % chunk;
    let offset = if chunk == block_size && within >= distance {
        chunk - 1 - within
    } else {
        within % distance
    };
    (slot / chunk) * distance + offset
}

/// Iterator over the passes needed to sort `padded_count` elements.
///
/// Driven by two running counters, `block_size` and `merge_distance`, the same way the dispatch
/// loop is written by hand.
#[derive(Debug, Clone)]
pub struct Schedule {
    padded_count: usize,
    unit_size: usize,
    fusion: Fusion,
    order: SortOrder,
    started: bool,
    block_size: usize,
    merge_distance: usize,
}

impl Schedule {
    /// Creates a schedule.
    ///
    /// `unit_size` is the number of lanes per synchronized group.  It must be a power of two; it is
    /// clamped to `padded_count / 2`.
    ///
    /// # Panics
    ///
    /// If `padded_count` is not a power of two, or `unit_size` is zero or not a power of two.
    /// [`Self::try_new`] reports these as `None` instead.
    pub fn new(padded_count: usize, unit_size: usize, fusion: Fusion, order: SortOrder) -> Self {
        match Self::try_new(padded_count, unit_size, fusion, order) {
            Some(schedule) => schedule,
            None => panic!(
                "padded count {padded_count} and unit size {unit_size} must be powers of two"
            ),
        }
    }

    /// Like [`Self::new`], but `None` when either size is not a power of two.
    pub fn try_new(
        padded_count: usize,
        unit_size: usize,
        fusion: Fusion,
        order: SortOrder,
    ) -> Option<Self> {
        if !padded_count.is_power_of_two() || !unit_size.is_power_of_two() {
            return None;
        }
        let unit_size = unit_size.min((padded_count / 2).max(1));
        Some(Schedule {
            padded_count,
            unit_size,
            fusion,
            order,
            started: false,
            block_size: 1,
            merge_distance: 0,
        })
    }

    pub fn padded_count(&self) -> usize {
        self.padded_count
    }

    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    pub fn fusion(&self) -> Fusion {
        self.fusion
    }

    fn pass(&self, kind: PassKind, block_size: usize, distance: usize) -> PassDescriptor {
        PassDescriptor {
            kind,
            grid_size: self.padded_count / 2,
            unit_size: self.unit_size,
            block_size,
            distance,
            order: self.order,
        }
    }

    fn next_fused(&mut self) -> Option<PassDescriptor> {
        if !self.started {
            self.started = true;
            self.block_size = self.unit_size * 2;
            return Some(self.pass(PassKind::First, self.block_size, self.unit_size));
        }
        if self.merge_distance == 0 {
            if self.block_size >= self.padded_count {
                return None;
            }
            self.merge_distance = self.block_size;
            self.block_size *= 2;
        }
        if self.merge_distance > self.unit_size {
            let pass = self.pass(PassKind::General, self.block_size, self.merge_distance);
            self.merge_distance /= 2;
            Some(pass)
        } else {
            let pass = self.pass(PassKind::Final, self.block_size, self.merge_distance);
            self.merge_distance = 0;
            Some(pass)
        }
    }

    fn next_unfused(&mut self) -> Option<PassDescriptor> {
        self.started = true;
        if self.merge_distance == 0 {
            if self.block_size >= self.padded_count {
                return None;
            }
            self.merge_distance = self.block_size;
            self.block_size *= 2;
        }
        let pass = self.pass(PassKind::General, self.block_size, self.merge_distance);
        self.merge_distance /= 2;
        Some(pass)
    }
}

impl Iterator for Schedule {
    type Item = PassDescriptor;

    fn next(&mut self) -> Option<PassDescriptor> {
        if self.padded_count < 2 {
            return None;
        }
        match self.fusion {
            Fusion::Enabled => self.next_fused(),
            Fusion::Disabled => self.next_unfused(),
        }
    }
}
