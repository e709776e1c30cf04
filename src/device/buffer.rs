//! Partitioned storage.

use super::Mapping;
use crate::error::CtrError;

/// An array of `T` split into one contiguous partition per device.
///
/// The buffer owns its partitions; operations borrow them for the duration
/// of a single launch and never keep them.
#[derive(Clone, Debug, PartialEq)]
pub struct DistributedBuffer<T> {
    mapping: Mapping,
    partitions: Vec<Vec<T>>,
}

impl<T: Clone + Default> DistributedBuffer<T> {
    /// Buffer of default values (zeros for numeric types).
    pub fn zeros(mapping: &Mapping) -> Self {
        Self::filled(mapping, T::default())
    }
}

impl<T: Clone> DistributedBuffer<T> {
    /// Buffer with every element set to `value`.
    pub fn filled(mapping: &Mapping, value: T) -> Self {
        let partitions = mapping
            .sizes()
            .iter()
            .map(|&size| vec![value.clone(); size])
            .collect();
        Self {
            mapping: mapping.clone(),
            partitions,
        }
    }

    /// Split a logical array according to `mapping`.
    ///
    /// # Errors
    ///
    /// Returns [`CtrError::LengthMismatch`] if `data.len() != mapping.len()`.
    pub fn from_slice(data: &[T], mapping: &Mapping) -> Result<Self, CtrError> {
        if data.len() != mapping.len() {
            return Err(CtrError::LengthMismatch {
                what: "buffer data",
                expected: mapping.len(),
                got: data.len(),
            });
        }

        let mut rest = data;
        let mut partitions = Vec::with_capacity(mapping.device_count());
        for &size in mapping.sizes() {
            let (head, tail) = rest.split_at(size);
            partitions.push(head.to_vec());
            rest = tail;
        }

        Ok(Self {
            mapping: mapping.clone(),
            partitions,
        })
    }

    /// Concatenate all partitions back into one logical array.
    pub fn to_vec(&self) -> Vec<T> {
        self.partitions.concat()
    }
}

impl<T> DistributedBuffer<T> {
    /// Build a buffer from explicit partitions; the mapping follows their sizes.
    pub fn from_partitions(partitions: Vec<Vec<T>>) -> Self {
        let mapping = Mapping::from_sizes(partitions.iter().map(Vec::len).collect::<Vec<_>>());
        Self {
            mapping,
            partitions,
        }
    }

    /// The partition layout.
    #[inline]
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Number of devices (including empty ones).
    #[inline]
    pub fn device_count(&self) -> usize {
        self.partitions.len()
    }

    /// Total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Devices whose partition is not empty.
    pub fn non_empty_devices(&self) -> impl Iterator<Item = usize> + '_ {
        self.mapping.non_empty_devices()
    }

    /// Partition resident on `device`.
    ///
    /// # Panics
    ///
    /// Panics if `device >= self.device_count()`.
    #[inline]
    pub fn partition(&self, device: usize) -> &[T] {
        &self.partitions[device]
    }

    /// Mutable partition resident on `device`.
    ///
    /// # Panics
    ///
    /// Panics if `device >= self.device_count()`.
    #[inline]
    pub fn partition_mut(&mut self, device: usize) -> &mut [T] {
        &mut self.partitions[device]
    }

    /// Mutable partitions, in device order.
    pub fn partitions_mut(&mut self) -> impl Iterator<Item = &mut [T]> + '_ {
        self.partitions.iter_mut().map(Vec::as_mut_slice)
    }
}
