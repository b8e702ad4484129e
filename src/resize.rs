//! Resize / compaction and the load-factor policy.
//!
//! A rebuild stages a complete empty table first, so an allocation
//! failure leaves the live table untouched. Active entries are then
//! replayed through `SlotTable::insert_clean`; tombstones are not copied,
//! which brings `fill` back down to `used`.

use crate::error::PairsError;
use crate::slot::{SlotTable, MIN_SIZE};

/// Growth multiplier applied to `used` when the table gets too full.
pub const GROWTH_FACTOR: usize = 4;
/// Shrink multiplier applied to `used` when the table is mostly empty.
pub const SHRINK_FACTOR: usize = 2;
/// A table shrinks once fewer than 1/`SHRINK_RATIO` of its slots are live.
pub const SHRINK_RATIO: usize = 8;

/// Smallest power of two strictly greater than `min_used`, at least
/// `MIN_SIZE`.
pub fn target_size(min_used: usize) -> Result<usize, PairsError> {
    let mut size = MIN_SIZE;
    while size <= min_used {
        size = size
            .checked_shl(1)
            .filter(|&s| s != 0)
            .ok_or(PairsError::AllocationFailure { slots: usize::MAX })?;
    }
    Ok(size)
}

/// Grow (or purge) once two thirds of the slots are non-`Unused`. Keeping
/// `fill` below capacity guarantees every probe meets an `Unused` slot.
pub(crate) fn needs_growth<K, V>(table: &SlotTable<K, V>) -> bool {
    table.fill() * 3 >= table.capacity() * 2
}

/// Size request after `needs_growth` fired.
pub(crate) fn growth_request<K, V>(table: &SlotTable<K, V>) -> usize {
    table.used() * GROWTH_FACTOR
}

/// Shrink (and purge) once the table is mostly empty.
pub(crate) fn needs_shrink<K, V>(table: &SlotTable<K, V>) -> bool {
    table.capacity() > MIN_SIZE && table.used() * SHRINK_RATIO < table.capacity()
}

/// Size request after `needs_shrink` fired.
pub(crate) fn shrink_request<K, V>(table: &SlotTable<K, V>) -> usize {
    table.used() * SHRINK_FACTOR
}

/// Rebuild `table` with room for more than `min_used` entries.
///
/// Returns `Ok(false)` when nothing needed doing: the target is the
/// minimum size, the table already has it, and there are no tombstones.
/// Never calls user code.
pub(crate) fn resize<K, V>(table: &mut SlotTable<K, V>, min_used: usize) -> Result<bool, PairsError> {
    let new_size = target_size(min_used)?;
    if new_size == MIN_SIZE && table.capacity() == MIN_SIZE && table.fill() == table.used() {
        return Ok(false);
    }

    let staged = SlotTable::with_capacity(new_size)?;
    let old = core::mem::replace(table, staged);
    tracing::debug!(
        old_capacity = old.capacity(),
        new_capacity = new_size,
        used = old.used(),
        fill = old.fill(),
        inline = table.is_inline(),
        "rebuilding slot table"
    );
    for entry in old.into_entries() {
        table.insert_clean(entry);
    }
    Ok(true)
}
