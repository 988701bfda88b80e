// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded batches of encoded records and the slot producers append to.
//!
//! A [`Batch`] is one generation: it is created empty, only ever appended to,
//! and handed by value to the shipper when it is detached. [`BatchBuffer`]
//! owns the current generation behind a mutex so that "append, check if full,
//! detach" and "detach whatever is there" are each a single critical section.
//! Exactly one caller can observe a given generation becoming full, so a
//! generation is never flushed twice and no record can land in a batch that is
//! already being shipped.

use std::sync::{Mutex, MutexGuard};

/// Slots reserved up front for a new batch; larger batches grow on demand.
const PREALLOCATED_RECORDS: usize = 256;

/// The records accumulated between two flushes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    records: Vec<Vec<u8>>,
    capacity: usize,
    generation: u64,
}

impl Batch {
    pub(crate) fn new(capacity: usize, generation: u64) -> Self {
        Batch {
            records: Vec::with_capacity(capacity.min(PREALLOCATED_RECORDS)),
            capacity,
            generation,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_records(records: Vec<Vec<u8>>, generation: u64) -> Self {
        let capacity = records.len().max(1);
        Batch {
            records,
            capacity,
            generation,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[Vec<u8>] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Vec<u8>> {
        self.records
    }

    fn push(&mut self, record: Vec<u8>) {
        debug_assert!(!self.is_full(), "a full batch is always detached");
        self.records.push(record);
    }
}

#[derive(Debug)]
pub(crate) struct BatchBuffer {
    current: Mutex<Batch>,
    capacity: usize,
}

impl BatchBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        BatchBuffer {
            current: Mutex::new(Batch::new(capacity, 0)),
            capacity,
        }
    }

    /// Appends a record. If it took the last free slot, the now full batch is
    /// detached and returned; the caller is responsible for shipping it.
    pub(crate) fn append(&self, record: Vec<u8>) -> Option<Batch> {
        let mut current = self.lock();
        current.push(record);
        if current.is_full() {
            Some(Self::swap(&mut current, self.capacity))
        } else {
            None
        }
    }

    /// Detaches the current batch, full or not, leaving a fresh empty one.
    pub(crate) fn detach(&self) -> Batch {
        let mut current = self.lock();
        Self::swap(&mut current, self.capacity)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.lock().generation()
    }

    fn swap(current: &mut MutexGuard<'_, Batch>, capacity: usize) -> Batch {
        let next = Batch::new(capacity, current.generation + 1);
        std::mem::replace(&mut **current, next)
    }

    fn lock(&self) -> MutexGuard<'_, Batch> {
        #[allow(clippy::expect_used)]
        self.current.lock().expect("lock poisoned")
    }
}
