use std::ops::{Index, IndexMut};

use crate::utils::MyHash;

#[derive(Clone, Default)]
struct Entry<T> {
    value: T,
    next: usize,
    occupied: bool,
}

/// Slot storage addressed by `usize` indices.
///
/// Index 0 is a permanently occupied sentry, so every handle handed out is
/// non-zero. Released slots go to a free list and are reused LIFO. The table
/// optionally hash-conses values through [`Table::put`]; slots reached that
/// way are chained into buckets and must never be released with
/// [`Table::take`].
pub struct Table<T> {
    data: Vec<Entry<T>>,

    buckets: Vec<usize>,
    bitmask: u64,

    /// Released slots, reused before the table grows.
    free: Vec<usize>,
    /// Number of occupied cells.
    real_size: usize,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table with room for `2^bits` cells before growing.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Table bits should be in the range 0..=31");

        let mut data = Vec::with_capacity(1 << bits);
        data.push(Entry {
            occupied: true,
            ..Entry::default()
        });

        let buckets_size = 1 << bits.min(16);

        Self {
            data,
            buckets: vec![0; buckets_size],
            bitmask: (buckets_size - 1) as u64,
            free: Vec::new(),
            real_size: 0,
        }
    }

    /// Allocate a cell and return its index.
    pub(crate) fn alloc(&mut self) -> usize {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.data.push(Entry::default());
                self.data.len() - 1
            }
        };
        self.data[index].occupied = true;
        self.real_size += 1;
        index
    }

    /// Add a new value to the table and return its index.
    pub fn add(&mut self, value: T) -> usize {
        let index = self.alloc();
        self.data[index].value = value;
        self.data[index].next = 0;
        index
    }

    /// Release the cell at the given index and return the value it held.
    pub fn take(&mut self, index: usize) -> T {
        assert!(self.is_occupied(index), "Index {} is not occupied", index);
        let entry = &mut self.data[index];
        entry.occupied = false;
        entry.next = 0;
        let value = std::mem::take(&mut entry.value);
        self.free.push(index);
        self.real_size -= 1;
        value
    }
}

impl<T> Table<T> {
    /// Number of cells ever allocated (the sentry excluded).
    pub fn size(&self) -> usize {
        self.data.len() - 1
    }
    /// Number of occupied cells.
    pub fn real_size(&self) -> usize {
        self.real_size
    }
    /// Number of released cells waiting for reuse.
    pub fn free_cells(&self) -> usize {
        self.free.len()
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        assert_ne!(index, 0, "Index is 0");
        self.data.get(index).is_some_and(|e| e.occupied)
    }

    pub fn value(&self, index: usize) -> &T {
        assert!(self.is_occupied(index), "Index {} is not occupied", index);
        &self.data[index].value
    }
    pub fn value_mut(&mut self, index: usize) -> &mut T {
        assert!(self.is_occupied(index), "Index {} is not occupied", index);
        &mut self.data[index].value
    }

    pub fn next(&self, index: usize) -> usize {
        self.data[index].next
    }
    fn set_next(&mut self, index: usize, next: usize) {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].next = next;
    }
}

impl<T> Table<T>
where
    T: MyHash + Eq + Default,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Return the index of `value`, adding it if it is not stored yet.
    pub fn put(&mut self, value: T) -> usize {
        let bucket = self.bucket_index(&value);
        let mut index = self.buckets[bucket];

        if index == 0 {
            let i = self.add(value);
            self.buckets[bucket] = i;
            return i;
        }

        loop {
            if &value == self.value(index) {
                return index;
            }
            match self.next(index) {
                0 => {
                    let i = self.add(value);
                    self.set_next(index, i);
                    return i;
                }
                next => index = next,
            }
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}

impl<T> IndexMut<usize> for Table<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        self.value_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc() {
        let mut table = Table::<()>::new(2);
        assert_eq!(table.alloc(), 1);
        assert_eq!(table.alloc(), 2);
        assert_eq!(table.alloc(), 3);
        // Grows past the initial capacity.
        assert_eq!(table.alloc(), 4);
        assert_eq!(table.real_size(), 4);
    }

    #[test]
    fn test_take_reuses_slot() {
        let mut table = Table::new(2);
        let a = table.add(10);
        let b = table.add(20);
        assert_eq!(table.take(a), 10);
        assert!(!table.is_occupied(a));
        assert_eq!(table.free_cells(), 1);
        let c = table.add(30);
        assert_eq!(c, a);
        assert_eq!(table[b], 20);
        assert_eq!(table[c], 30);
        assert_eq!(table.size(), 2);
    }

    #[test]
    #[should_panic(expected = "is not occupied")]
    fn test_take_twice_panics() {
        let mut table = Table::new(2);
        let a = table.add(1);
        table.take(a);
        table.take(a);
    }

    #[test]
    fn test_put() {
        #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
        struct Item(i32);

        impl MyHash for Item {
            fn hash(&self) -> u64 {
                self.0.unsigned_abs() as u64
            }
        }

        let mut table = Table::new(2);
        let index1 = table.put(Item(5));
        let index2 = table.put(Item(-5));
        assert_ne!(index1, index2);
        assert_eq!(table.put(Item(5)), index1);
        assert_eq!(table[index1], Item(5));
        assert_eq!(table[index2], Item(-5));
        assert_eq!(table.next(index1), index2);
    }
}
