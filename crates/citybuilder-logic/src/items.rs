//! Items and reservation-aware item storage.
//!
//! A storage tracks committed stock separately from two kinds of
//! reservation: outgoing stock promised to a walker (`reserved`) and
//! incoming capacity promised to a delivery (`reserved_capacity`). Neither
//! changes stored quantity, but both shrink what can be given or received,
//! so two walkers can never be promised the same units.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resource kind, identified by key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Item(pub String);

impl Item {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Item {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub item: Item,
    pub quantity: u32,
}

impl ItemQuantity {
    pub fn new(item: impl Into<Item>, quantity: u32) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }
}

/// Which items a giver or receiver deals in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemFilter {
    #[default]
    All,
    Only(Vec<Item>),
}

impl ItemFilter {
    pub fn only(items: &[&str]) -> Self {
        Self::Only(items.iter().map(|k| Item::new(*k)).collect())
    }

    pub fn accepts(&self, item: &Item) -> bool {
        match self {
            ItemFilter::All => true,
            ItemFilter::Only(items) => items.contains(item),
        }
    }
}

/// Capacity model of a storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageMode {
    /// Unbounded
    Free,
    /// One cap shared by all items
    Total(u32),
    /// The same cap applied to each item independently
    PerItem(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStorage {
    pub mode: StorageMode,
    #[serde(default)]
    items: BTreeMap<Item, u32>,
    #[serde(default)]
    reserved: BTreeMap<Item, u32>,
    #[serde(default)]
    reserved_capacity: BTreeMap<Item, u32>,
}

impl Default for ItemStorage {
    fn default() -> Self {
        Self::new(StorageMode::Free)
    }
}

fn bump(map: &mut BTreeMap<Item, u32>, item: &Item, amount: u32) {
    if amount == 0 {
        return;
    }
    *map.entry(item.clone()).or_insert(0) += amount;
}

fn saturating_sum<'a>(values: impl Iterator<Item = &'a u32>) -> u32 {
    values.fold(0, |total, value| total.saturating_add(*value))
}

fn drop_amount(map: &mut BTreeMap<Item, u32>, item: &Item, amount: u32) {
    if let Some(value) = map.get_mut(item) {
        *value = value.saturating_sub(amount);
        if *value == 0 {
            map.remove(item);
        }
    }
}

impl ItemStorage {
    pub fn new(mode: StorageMode) -> Self {
        Self {
            mode,
            items: BTreeMap::new(),
            reserved: BTreeMap::new(),
            reserved_capacity: BTreeMap::new(),
        }
    }

    pub fn total(capacity: u32) -> Self {
        Self::new(StorageMode::Total(capacity))
    }

    pub fn per_item(capacity: u32) -> Self {
        Self::new(StorageMode::PerItem(capacity))
    }

    pub fn with_items(mut self, item: impl Into<Item>, quantity: u32) -> Self {
        let item = item.into();
        self.add_items(&item, quantity);
        self
    }

    pub fn quantity(&self, item: &Item) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    /// Outgoing reservation for this item
    pub fn reserved(&self, item: &Item) -> u32 {
        self.reserved.get(item).copied().unwrap_or(0)
    }

    /// Incoming reservation for this item
    pub fn reserved_capacity(&self, item: &Item) -> u32 {
        self.reserved_capacity.get(item).copied().unwrap_or(0)
    }

    /// Stock that can still be promised or removed
    pub fn available(&self, item: &Item) -> u32 {
        self.quantity(item).saturating_sub(self.reserved(item))
    }

    pub fn capacity(&self, _item: &Item) -> u32 {
        match self.mode {
            StorageMode::Free => u32::MAX,
            StorageMode::Total(cap) | StorageMode::PerItem(cap) => cap,
        }
    }

    /// Units of `item` that can still be added or promised
    pub fn remaining_capacity(&self, item: &Item) -> u32 {
        match self.mode {
            // unbounded, but a single stack still has to fit in a u32
            StorageMode::Free => u32::MAX
                .saturating_sub(self.quantity(item).saturating_add(self.reserved_capacity(item))),
            StorageMode::Total(cap) => cap.saturating_sub(
                self.total_quantity()
                    .saturating_add(self.total_reserved_capacity()),
            ),
            StorageMode::PerItem(cap) => {
                cap.saturating_sub(self.quantity(item).saturating_add(self.reserved_capacity(item)))
            }
        }
    }

    pub fn total_quantity(&self) -> u32 {
        saturating_sum(self.items.values())
    }

    pub fn total_reserved(&self) -> u32 {
        saturating_sum(self.reserved.values())
    }

    pub fn total_reserved_capacity(&self) -> u32 {
        saturating_sum(self.reserved_capacity.values())
    }

    pub fn has_reservations(&self) -> bool {
        !self.reserved.is_empty() || !self.reserved_capacity.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stored stacks in key order
    pub fn items(&self) -> impl Iterator<Item = ItemQuantity> + '_ {
        self.items
            .iter()
            .map(|(item, quantity)| ItemQuantity::new(item.clone(), *quantity))
    }

    /// Adds up to `quantity`, clamped to remaining capacity. Returns the amount added.
    pub fn add_items(&mut self, item: &Item, quantity: u32) -> u32 {
        let added = quantity.min(self.remaining_capacity(item));
        bump(&mut self.items, item, added);
        added
    }

    /// Removes up to `quantity` of unreserved stock. Returns the amount removed.
    pub fn remove_items(&mut self, item: &Item, quantity: u32) -> u32 {
        let removed = quantity.min(self.available(item));
        drop_amount(&mut self.items, item, removed);
        removed
    }

    /// Move as much of `quantity` as `other` accepts. Nothing leaves this
    /// storage that `other` did not take.
    pub fn move_item_to(&mut self, item: &Item, quantity: u32, other: &mut ItemStorage) -> u32 {
        let moved = quantity
            .min(self.available(item))
            .min(other.remaining_capacity(item));
        drop_amount(&mut self.items, item, moved);
        bump(&mut other.items, item, moved);
        moved
    }

    /// Move every unreserved stack, item by item in key order. Partial moves are reported.
    pub fn move_items_to(&mut self, other: &mut ItemStorage) -> Vec<ItemQuantity> {
        let keys: Vec<Item> = self.items.keys().cloned().collect();
        let mut moved = Vec::new();
        for item in keys {
            let available = self.available(&item);
            let amount = self.move_item_to(&item, available, other);
            if amount > 0 {
                moved.push(ItemQuantity::new(item, amount));
            }
        }
        moved
    }

    /// Promise stock to a walker. Reserving more than is available is a programmer error.
    pub fn reserve(&mut self, item: &Item, quantity: u32) -> u32 {
        let available = self.available(item);
        debug_assert!(
            quantity <= available,
            "reserving {quantity} {item} with only {available} available"
        );
        let amount = quantity.min(available);
        if amount < quantity {
            log::warn!("clamped reserve of {quantity} {item} to {amount}");
        }
        bump(&mut self.reserved, item, amount);
        amount
    }

    pub fn unreserve(&mut self, item: &Item, quantity: u32) {
        debug_assert!(
            quantity <= self.reserved(item),
            "unreserving more {item} than reserved"
        );
        drop_amount(&mut self.reserved, item, quantity);
    }

    /// Promise capacity to an incoming delivery
    pub fn reserve_capacity(&mut self, item: &Item, quantity: u32) -> u32 {
        let remaining = self.remaining_capacity(item);
        debug_assert!(
            quantity <= remaining,
            "reserving {quantity} capacity for {item} with only {remaining} remaining"
        );
        let amount = quantity.min(remaining);
        if amount < quantity {
            log::warn!("clamped reserve capacity of {quantity} {item} to {amount}");
        }
        bump(&mut self.reserved_capacity, item, amount);
        amount
    }

    pub fn unreserve_capacity(&mut self, item: &Item, quantity: u32) {
        debug_assert!(
            quantity <= self.reserved_capacity(item),
            "unreserving more {item} capacity than reserved"
        );
        drop_amount(&mut self.reserved_capacity, item, quantity);
    }

    /// Complete an outgoing reservation by moving the promised stock into `into`.
    /// The whole reservation is consumed; returns what actually moved.
    pub fn take_reserved(&mut self, item: &Item, quantity: u32, into: &mut ItemStorage) -> u32 {
        let promised = quantity.min(self.reserved(item));
        drop_amount(&mut self.reserved, item, promised);
        self.move_item_to(item, promised, into)
    }

    /// Complete an incoming reservation by pulling up to `quantity` from `from`.
    /// The whole reservation is consumed; returns what actually moved.
    pub fn deliver_reserved(&mut self, item: &Item, quantity: u32, from: &mut ItemStorage) -> u32 {
        let promised = quantity.min(self.reserved_capacity(item));
        drop_amount(&mut self.reserved_capacity, item, promised);
        from.move_item_to(item, quantity, self)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.reserved.clear();
        self.reserved_capacity.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a() -> Item {
        Item::new("A")
    }

    fn b() -> Item {
        Item::new("B")
    }

    #[test]
    fn test_add_clamps_to_capacity() {
        let mut storage = ItemStorage::total(100);
        assert_eq!(storage.add_items(&a(), 80), 80);
        assert_eq!(storage.add_items(&b(), 50), 20);
        assert_eq!(storage.total_quantity(), 100);
        assert_eq!(storage.add_items(&a(), 1), 0);
    }

    #[test]
    fn test_free_storage_stack_saturates() {
        let mut storage = ItemStorage::default();
        assert_eq!(storage.add_items(&a(), u32::MAX - 5), u32::MAX - 5);
        assert_eq!(storage.add_items(&a(), 100), 5);
        assert_eq!(storage.quantity(&a()), u32::MAX);
        assert_eq!(storage.remaining_capacity(&a()), 0);
        assert_eq!(storage.remaining_capacity(&b()), u32::MAX);

        // stacks of different items still sum without overflowing
        storage.add_items(&b(), 10);
        assert_eq!(storage.total_quantity(), u32::MAX);
    }

    #[test]
    fn test_per_item_capacity() {
        let mut storage = ItemStorage::per_item(10);
        assert_eq!(storage.add_items(&a(), 15), 10);
        assert_eq!(storage.add_items(&b(), 15), 10);
        assert_eq!(storage.total_quantity(), 20);
    }

    #[test]
    fn test_remove_clamps_to_available() {
        let mut storage = ItemStorage::default().with_items("A", 10);
        storage.reserve(&a(), 4);
        assert_eq!(storage.remove_items(&a(), 10), 6);
        assert_eq!(storage.quantity(&a()), 4);
        assert_eq!(storage.available(&a()), 0);
    }

    #[test]
    fn test_move_partial_into_limited_destination() {
        let mut source = ItemStorage::total(100);
        source.add_items(&a(), 80);
        let mut destination = ItemStorage::total(30);

        let moved = source.move_item_to(&a(), 50, &mut destination);

        assert_eq!(moved, 30);
        assert_eq!(destination.quantity(&a()), 30);
        assert_eq!(source.quantity(&a()), 50);
    }

    #[test]
    fn test_move_all_items_in_key_order() {
        let mut source = ItemStorage::default()
            .with_items("B", 5)
            .with_items("A", 5);
        let mut destination = ItemStorage::total(7);

        let moved = source.move_items_to(&mut destination);
        assert_eq!(
            moved,
            vec![ItemQuantity::new("A", 5), ItemQuantity::new("B", 2)]
        );
        assert_eq!(source.quantity(&b()), 3);
        assert!(source.quantity(&a()) == 0);
    }

    #[test]
    fn test_reservation_prevents_double_spend() {
        let mut storage = ItemStorage::default().with_items("A", 10);
        assert_eq!(storage.reserve(&a(), 10), 10);
        assert_eq!(storage.available(&a()), 0);
        assert_eq!(storage.quantity(&a()), 10);

        let mut walker = ItemStorage::total(5);
        assert_eq!(storage.move_item_to(&a(), 10, &mut walker), 0);

        storage.unreserve(&a(), 10);
        assert_eq!(storage.available(&a()), 10);
        assert!(!storage.has_reservations());
    }

    #[test]
    fn test_capacity_reservations_share_total_cap() {
        let mut storage = ItemStorage::total(20);
        storage.add_items(&a(), 5);
        storage.reserve_capacity(&b(), 10);
        // Shared cap: reserved B capacity also limits A
        assert_eq!(storage.remaining_capacity(&a()), 5);
        assert_eq!(storage.add_items(&a(), 10), 5);
        assert_eq!(storage.remaining_capacity(&b()), 0);
    }

    #[test]
    fn test_take_reserved_consumes_reservation() {
        let mut giver = ItemStorage::default().with_items("A", 10);
        giver.reserve(&a(), 6);
        let mut carried = ItemStorage::total(6);

        assert_eq!(giver.take_reserved(&a(), 6, &mut carried), 6);
        assert_eq!(giver.quantity(&a()), 4);
        assert_eq!(giver.reserved(&a()), 0);
        assert_eq!(carried.quantity(&a()), 6);
    }

    #[test]
    fn test_deliver_reserved_consumes_capacity_reservation() {
        let mut receiver = ItemStorage::total(10);
        receiver.reserve_capacity(&a(), 4);
        let mut carried = ItemStorage::default().with_items("A", 4);

        assert_eq!(receiver.deliver_reserved(&a(), 4, &mut carried), 4);
        assert_eq!(receiver.quantity(&a()), 4);
        assert_eq!(receiver.total_reserved_capacity(), 0);
        assert!(carried.is_empty());
    }

    #[test]
    fn test_quantity_never_exceeds_capacity() {
        let mut storage = ItemStorage::total(50);
        let mut other = ItemStorage::total(40);
        let ops: [(u32, u32); 6] = [(30, 0), (40, 10), (5, 20), (60, 0), (0, 45), (25, 5)];
        for (add, remove) in ops {
            storage.add_items(&a(), add);
            storage.add_items(&b(), add / 2);
            storage.remove_items(&a(), remove);
            storage.move_items_to(&mut other);
            other.remove_items(&b(), remove);
            assert!(storage.total_quantity() <= 50);
            assert!(other.total_quantity() <= 40);
        }
    }

    #[test]
    fn test_item_filter() {
        let filter = ItemFilter::only(&["wood", "stone"]);
        assert!(filter.accepts(&Item::new("wood")));
        assert!(!filter.accepts(&Item::new("fish")));
        assert!(ItemFilter::All.accepts(&Item::new("fish")));
    }
}
