use crate::fault::ExecError;
use crate::value::ArrayRef;

/// Fixed-length integer arrays backing a VM.
///
/// Arrays are never freed individually. The store only shrinks from the top
/// through [`truncate`](Self::truncate), so a handle stays valid until the
/// store is cut below it. The total element count across live arrays is
/// capped by `max_elements`.
pub struct ArrayStore {
    arrays: Vec<Box<[i32]>>,
    max_length: usize,
    max_elements: usize,
    elements: usize,
}

impl ArrayStore {
    /// Default cap on a single allocation, in elements.
    pub const DEFAULT_MAX_LENGTH: usize = 1 << 20;
    /// Default cap on all live arrays together, in elements.
    pub const DEFAULT_MAX_ELEMENTS: usize = 1 << 22;

    pub fn new() -> Self {
        Self::with_limits(Self::DEFAULT_MAX_LENGTH, Self::DEFAULT_MAX_ELEMENTS)
    }

    pub fn with_limits(max_length: usize, max_elements: usize) -> Self {
        Self {
            arrays: Vec::new(),
            max_length,
            max_elements,
            elements: 0,
        }
    }

    /// Allocate a zero-filled array of `length` elements
    pub fn allocate(&mut self, length: i32) -> Result<ArrayRef, ExecError> {
        let len = usize::try_from(length)
            .ok()
            .filter(|&n| n <= self.max_length)
            .ok_or(ExecError::InvalidLength {
                length: i64::from(length),
                limit: self.max_length,
            })?;
        self.reserve(len)?;
        Ok(self.insert(vec![0; len].into_boxed_slice()))
    }

    /// Allocate an array holding a copy of `values`
    pub fn allocate_from(&mut self, values: &[i32]) -> Result<ArrayRef, ExecError> {
        if values.len() > self.max_length {
            return Err(ExecError::InvalidLength {
                length: values.len() as i64,
                limit: self.max_length,
            });
        }
        self.reserve(values.len())?;
        Ok(self.insert(values.into()))
    }

    fn reserve(&self, len: usize) -> Result<(), ExecError> {
        if len > self.max_elements.saturating_sub(self.elements) {
            return Err(ExecError::HeapExhausted {
                requested: len,
                in_use: self.elements,
                limit: self.max_elements,
            });
        }
        Ok(())
    }

    fn insert(&mut self, data: Box<[i32]>) -> ArrayRef {
        let handle = ArrayRef(self.arrays.len() as u32);
        self.elements += data.len();
        self.arrays.push(data);
        handle
    }

    /// Release every array allocated after the first `len`.
    ///
    /// Handles to released arrays become dangling; their indices are handed
    /// out again by later allocations.
    pub fn truncate(&mut self, len: usize) {
        for data in self.arrays.drain(len.min(self.arrays.len())..) {
            self.elements -= data.len();
        }
    }

    /// Read element `index` of `array`
    pub fn load(&self, array: ArrayRef, index: i32) -> Result<i32, ExecError> {
        let data = self.resolve(array)?;
        let slot = checked_index(index, data.len())?;
        Ok(data[slot])
    }

    /// Write element `index` of `array`
    pub fn store(&mut self, array: ArrayRef, index: i32, value: i32) -> Result<(), ExecError> {
        let data = self
            .arrays
            .get_mut(array.0 as usize)
            .ok_or(ExecError::DanglingArray(array.0))?;
        let slot = checked_index(index, data.len())?;
        data[slot] = value;
        Ok(())
    }

    pub fn length(&self, array: ArrayRef) -> Result<usize, ExecError> {
        self.resolve(array).map(|data| data.len())
    }

    /// Borrow the contents of `array`, if it belongs to this store.
    pub fn get(&self, array: ArrayRef) -> Option<&[i32]> {
        self.arrays.get(array.0 as usize).map(|data| &data[..])
    }

    /// Number of arrays allocated so far.
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Elements held by all live arrays.
    pub fn elements(&self) -> usize {
        self.elements
    }

    fn resolve(&self, array: ArrayRef) -> Result<&[i32], ExecError> {
        self.get(array).ok_or(ExecError::DanglingArray(array.0))
    }
}

impl Default for ArrayStore {
    fn default() -> Self {
        Self::new()
    }
}

fn checked_index(index: i32, length: usize) -> Result<usize, ExecError> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < length)
        .ok_or(ExecError::IndexOutOfBounds { index, length })
}
