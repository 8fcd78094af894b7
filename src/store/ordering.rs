//! Dense 1-based ordering for lists within a board and cards within a list.
//!
//! Every sequence the store keeps is ordered by position with positions
//! exactly `1..=N`. Removal closes the gap; placement inserts before any
//! entry already holding the requested position and renumbers everything
//! after it. Placing an entry that is already at its requested position is
//! therefore a no-op, which is what makes replayed upserts idempotent.

use taskboard_common::{Card, List};

pub(crate) trait Positioned {
    fn key(&self) -> u64;
    fn position(&self) -> u32;
    fn set_position(&mut self, position: u32);
}

impl Positioned for List {
    fn key(&self) -> u64 {
        self.id
    }
    fn position(&self) -> u32 {
        self.position
    }
    fn set_position(&mut self, position: u32) {
        self.position = position;
    }
}

impl Positioned for Card {
    fn key(&self) -> u64 {
        self.id
    }
    fn position(&self) -> u32 {
        self.position
    }
    fn set_position(&mut self, position: u32) {
        self.position = position;
    }
}

/// Stable sort by position, then renumber densely.
pub(crate) fn normalize<T: Positioned>(items: &mut [T]) {
    items.sort_by_key(|item| item.position());
    renumber(items);
}

pub(crate) fn renumber<T: Positioned>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_position(index as u32 + 1);
    }
}

/// Remove the entry with `key`, closing the gap it leaves.
pub(crate) fn take<T: Positioned>(items: &mut Vec<T>, key: u64) -> Option<T> {
    let index = items.iter().position(|item| item.key() == key)?;
    let removed = items.remove(index);
    for (offset, item) in items[index..].iter_mut().enumerate() {
        item.set_position((index + offset) as u32 + 1);
    }
    Some(removed)
}

/// Insert `item` at its own 1-based position, clamped to the sequence.
/// Position 0 means "unspecified" and appends.
pub(crate) fn place<T: Positioned>(items: &mut Vec<T>, item: T) {
    let index = match item.position() {
        0 => items.len(),
        p => (p as usize - 1).min(items.len()),
    };
    items.insert(index, item);
    renumber(items);
}

/// The 1-based position an entry requested at `requested` would land at.
pub(crate) fn clamp_position(requested: u32, len: usize) -> u32 {
    match requested {
        0 => len as u32 + 1,
        p => p.min(len as u32 + 1),
    }
}

pub(crate) fn is_dense<T: Positioned>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.position() == index as u32 + 1)
}
