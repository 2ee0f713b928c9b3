//! Growable array with an optional per-element destructor hook
//!
//! `Vector<T>` backs every collection in the server: the connection records,
//! the poll descriptors and the pending-write queue. It keeps its own logical
//! capacity so growth is deterministic (0 → 1, then doubling) and only shrinks
//! on an explicit `shrink_to_fit()`.
//!
//! The destructor is a plain `fn(&mut T)` that runs whenever the array itself
//! discards an element (`delete`, `replace`, `clear`, the `*_discard` pops and
//! drop). Elements handed back to the caller (`pop`, `pop_front`, `take`) are
//! never passed to it.
//!
//! # Example
//!
//! ```
//! use blackhole_core::vector::Vector;
//!
//! let mut v = Vector::new();
//! v.push(1).unwrap();
//! v.push(2).unwrap();
//! v.insert(0, 0).unwrap();
//! assert_eq!(v.as_slice(), &[0, 1, 2]);
//! assert_eq!(v.capacity(), 4);
//! assert_eq!(v.pop(), Some(2));
//! ```

use crate::error::{VectorError, VectorResult};
use std::fmt;

/// Hook invoked on an element the array discards.
pub type Destructor<T> = fn(&mut T);

/// Growable array over `T`.
pub struct Vector<T> {
    buf: Vec<T>,
    /// Logical capacity; `buf.capacity() >= capacity` always holds.
    capacity: usize,
    destructor: Option<Destructor<T>>,
}

impl<T> Vector<T> {
    /// Create an empty array with no destructor.
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            capacity: 0,
            destructor: None,
        }
    }

    /// Create an empty array whose discarded elements are passed to `destructor`.
    pub const fn with_destructor(destructor: Destructor<T>) -> Self {
        Self {
            buf: Vec::new(),
            capacity: 0,
            destructor: Some(destructor),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn has_destructor(&self) -> bool {
        self.destructor.is_some()
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[inline]
    pub fn first(&self) -> Option<&T> {
        self.buf.first()
    }

    #[inline]
    pub fn first_mut(&mut self) -> Option<&mut T> {
        self.buf.first_mut()
    }

    #[inline]
    pub fn last(&self) -> Option<&T> {
        self.buf.last()
    }

    #[inline]
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.buf.last_mut()
    }

    /// Element at `index`, clamped to the last valid slot.
    ///
    /// Returns `None` only when the array is empty.
    #[inline]
    pub fn at(&self, index: usize) -> Option<&T> {
        let last = self.buf.len().checked_sub(1)?;
        self.buf.get(index.min(last))
    }

    /// Mutable element at `index`, clamped to the last valid slot.
    #[inline]
    pub fn at_mut(&mut self, index: usize) -> Option<&mut T> {
        let last = self.buf.len().checked_sub(1)?;
        self.buf.get_mut(index.min(last))
    }

    /// Element at `index`, `None` when out of range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.buf.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.buf.get_mut(index)
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.buf
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.buf
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.buf.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.buf.iter_mut()
    }

    /// Linear scan for the first element `cmp` considers equal to `element`.
    pub fn find<F>(&self, element: &T, cmp: F) -> Option<&T>
    where
        F: Fn(&T, &T) -> bool,
    {
        self.buf.iter().find(|candidate| cmp(candidate, element))
    }

    /// Index of the first element `cmp` considers equal to `element`.
    pub fn position<F>(&self, element: &T, cmp: F) -> Option<usize>
    where
        F: Fn(&T, &T) -> bool,
    {
        self.buf.iter().position(|candidate| cmp(candidate, element))
    }

    /// Visit every element mutably.
    pub fn walk<F>(&mut self, f: F)
    where
        F: FnMut(&mut T),
    {
        self.buf.iter_mut().for_each(f);
    }

    // ========================================================================
    // Capacity
    // ========================================================================

    /// Double the capacity, or set it to 1 on first growth.
    pub fn expand(&mut self) -> VectorResult<()> {
        let target = if self.capacity == 0 {
            1
        } else {
            self.capacity
                .checked_mul(2)
                .ok_or(VectorError::CapacityOverflow)?
        };
        self.grow_to(target)
    }

    /// Expand until the capacity reaches at least `size`.
    pub fn expand_until(&mut self, size: usize) -> VectorResult<()> {
        while self.capacity < size {
            self.expand()?;
        }
        Ok(())
    }

    /// Release unused capacity. Frees the storage entirely when empty.
    pub fn shrink_to_fit(&mut self) {
        if self.buf.is_empty() {
            if self.capacity != 0 {
                self.buf = Vec::new();
                self.capacity = 0;
            }
        } else if self.capacity > self.buf.len() {
            self.buf.shrink_to(self.buf.len());
            self.capacity = self.buf.len();
        }
    }

    fn grow_to(&mut self, target: usize) -> VectorResult<()> {
        let additional = target - self.buf.len();
        self.buf
            .try_reserve_exact(additional)
            .map_err(|e| VectorError::from_reserve(target, e))?;
        self.capacity = target;
        Ok(())
    }

    #[inline]
    fn reserve_one(&mut self) -> VectorResult<()> {
        if self.buf.len() == self.capacity {
            self.expand()
        } else {
            Ok(())
        }
    }

    #[inline]
    fn discard(&self, mut value: T) {
        if let Some(destructor) = self.destructor {
            destructor(&mut value);
        }
    }

    // ========================================================================
    // Tail / head
    // ========================================================================

    /// Append `value`, O(1) amortized.
    pub fn push(&mut self, value: T) -> VectorResult<()> {
        self.reserve_one()?;
        self.buf.push(value);
        Ok(())
    }

    /// Remove the last element and hand it to the caller.
    pub fn pop(&mut self) -> Option<T> {
        self.buf.pop()
    }

    /// Remove the last element, running the destructor on it.
    pub fn pop_discard(&mut self) {
        if let Some(value) = self.buf.pop() {
            self.discard(value);
        }
    }

    /// Prepend `value`, shifting every element, O(n).
    pub fn push_front(&mut self, value: T) -> VectorResult<()> {
        self.reserve_one()?;
        self.buf.insert(0, value);
        Ok(())
    }

    /// Remove the first element and hand it to the caller, O(n).
    pub fn pop_front(&mut self) -> Option<T> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.remove(0))
        }
    }

    /// Remove the first element, running the destructor on it.
    pub fn pop_front_discard(&mut self) {
        if let Some(value) = self.pop_front() {
            self.discard(value);
        }
    }

    // ========================================================================
    // Arbitrary index
    // ========================================================================

    /// Insert `value` at `index`. An out-of-range index appends.
    pub fn insert(&mut self, index: usize, value: T) -> VectorResult<()> {
        if index >= self.buf.len() {
            return self.push(value);
        }
        self.reserve_one()?;
        self.buf.insert(index, value);
        Ok(())
    }

    /// Remove the element at `index`, running the destructor on it.
    ///
    /// An out-of-range index removes the last element instead. Order of the
    /// remaining elements is preserved.
    pub fn delete(&mut self, index: usize) {
        if index >= self.buf.len() {
            self.pop_discard();
            return;
        }
        let value = self.buf.remove(index);
        self.discard(value);
    }

    /// Overwrite the element at `index`, running the destructor on the old one.
    ///
    /// An out-of-range index degrades to a destroying pop, like `delete`, and
    /// the unstored `value` is handed back as `Err`.
    pub fn replace(&mut self, index: usize, value: T) -> Result<(), T> {
        let destructor = self.destructor;
        match self.buf.get_mut(index) {
            Some(slot) => {
                if let Some(destructor) = destructor {
                    destructor(slot);
                }
                *slot = value;
                Ok(())
            }
            None => {
                self.pop_discard();
                Err(value)
            }
        }
    }

    /// Remove the element at `index` and hand it to the caller.
    ///
    /// An out-of-range index pops the last element instead.
    pub fn take(&mut self, index: usize) -> Option<T> {
        if index >= self.buf.len() {
            return self.buf.pop();
        }
        Some(self.buf.remove(index))
    }

    /// Run the destructor on every element and reset the length.
    ///
    /// Capacity is retained.
    pub fn clear(&mut self) {
        if let Some(destructor) = self.destructor {
            self.buf.iter_mut().for_each(destructor);
        }
        self.buf.clear();
    }

    /// Release everything, running the destructor on the remaining elements.
    pub fn destroy(self) {
        drop(self);
    }
}

impl<T> Default for Vector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Vector<T> {
    fn drop(&mut self) {
        if let Some(destructor) = self.destructor {
            self.buf.iter_mut().for_each(destructor);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vector")
            .field("len", &self.buf.len())
            .field("capacity", &self.capacity)
            .field("elements", &self.buf)
            .finish()
    }
}

impl<'a, T> IntoIterator for &'a Vector<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.buf.iter()
    }
}
