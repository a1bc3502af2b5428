use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};
use std::sync::Arc;

use crate::utils::error::SlaveError;

/// Shared handle to a caller-owned coil cell (function 0x01).
///
/// The slave context holds a clone of the handle, never the storage itself;
/// the caller keeps its own clone to observe and update the value. Any
/// non-zero value reads back as an ON bit on the wire.
#[derive(Debug, Clone, Default)]
pub struct CoilCell(Arc<AtomicU8>);

impl CoilCell {
    pub fn new(value: u8) -> Self {
        Self(Arc::new(AtomicU8::new(value)))
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: u8) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn is_on(&self) -> bool {
        self.get() != 0
    }
}

/// Shared handle to a caller-owned 16-bit register cell (functions 0x03,
/// 0x06 and 0x16). Same ownership rules as [`CoilCell`].
#[derive(Debug, Clone, Default)]
pub struct RegisterCell(Arc<AtomicU16>);

impl RegisterCell {
    pub fn new(value: u16) -> Self {
        Self(Arc::new(AtomicU16::new(value)))
    }

    pub fn get(&self) -> u16 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: u16) {
        self.0.store(value, Ordering::Relaxed);
    }
}

/// Ordered mapping from 16-bit register addresses to storage cells.
///
/// Built once at context construction from a caller-supplied mapping slice.
/// Addresses must be strictly ascending; `build` rejects duplicates and
/// out-of-order entries up front instead of letting multi-register reads
/// fail with a spurious address gap later.
#[derive(Debug, Clone)]
pub struct RegisterTable<C> {
    entries: Vec<(u16, C)>,
}

impl<C: Clone> RegisterTable<C> {
    pub fn build(map: &[(u16, C)]) -> Result<Self, SlaveError> {
        let mut entries = Vec::with_capacity(map.len());
        let mut last: Option<u16> = None;

        for (address, cell) in map {
            if let Some(prev) = last {
                if *address <= prev {
                    return Err(SlaveError::MapNotAscending(*address));
                }
            }
            entries.push((*address, cell.clone()));
            last = Some(*address);
        }

        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a single address. O(log n) over the ascending entries.
    pub fn find(&self, address: u16) -> Option<&C> {
        self.entries
            .binary_search_by_key(&address, |entry| entry.0)
            .ok()
            .map(|index| &self.entries[index].1)
    }

    /// Resolve a run of `quantity` consecutive addresses starting at `start`.
    ///
    /// The run must begin at a mapped address and every subsequent address
    /// must be the immediate table successor of the previous one. A missing
    /// start address rejects with `AddressNotMapped`; a hole anywhere in the
    /// run rejects with `AddressGap` naming the first absent address.
    pub fn contiguous_run(&self, start: u16, quantity: u16) -> Result<&[(u16, C)], SlaveError> {
        let begin = self
            .entries
            .binary_search_by_key(&start, |entry| entry.0)
            .map_err(|_| SlaveError::AddressNotMapped(start))?;

        let end = begin + quantity as usize;
        if end > self.entries.len() {
            let expected = start.wrapping_add((self.entries.len() - begin) as u16);
            return Err(SlaveError::AddressGap(expected));
        }

        for (offset, (address, _)) in self.entries[begin..end].iter().enumerate() {
            let expected = start.wrapping_add(offset as u16);
            if *address != expected {
                return Err(SlaveError::AddressGap(expected));
            }
        }

        Ok(&self.entries[begin..end])
    }
}
