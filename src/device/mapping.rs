//! Partition layouts.

/// How a logical array is split across devices.
///
/// Device `d` owns the contiguous range `offset(d)..offset(d) + size(d)` of
/// the logical array. Devices may own nothing; they are skipped on launch.
///
/// ```text
/// stripe(10, 3):
///   device 0: [0..4)   device 1: [4..7)   device 2: [7..10)
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Mapping {
    sizes: Vec<usize>,
}

impl Mapping {
    /// Mapping with explicit per-device partition sizes.
    pub fn from_sizes(sizes: impl Into<Vec<usize>>) -> Self {
        Self {
            sizes: sizes.into(),
        }
    }

    /// Split `len` elements as evenly as possible across `n_devices`.
    ///
    /// The first `len % n_devices` devices get one extra element. A device
    /// count of zero is treated as one.
    pub fn stripe(len: usize, n_devices: usize) -> Self {
        let n_devices = n_devices.max(1);
        let base = len / n_devices;
        let rem = len % n_devices;
        let sizes = (0..n_devices)
            .map(|d| base + usize::from(d < rem))
            .collect::<Vec<_>>();
        Self { sizes }
    }

    /// All `len` elements on `device`, nothing on the other devices.
    pub fn single(device: usize, n_devices: usize, len: usize) -> Self {
        let n_devices = n_devices.max(device + 1);
        let mut sizes = vec![0; n_devices];
        sizes[device] = len;
        Self { sizes }
    }

    /// A full copy of `len` elements on every device.
    ///
    /// Used for per-bin tables (sums, offsets) that every partition indexes
    /// into. The logical length counts every copy.
    pub fn mirror(n_devices: usize, len: usize) -> Self {
        Self {
            sizes: vec![len; n_devices.max(1)],
        }
    }

    /// Number of devices (including empty ones).
    #[inline]
    pub fn device_count(&self) -> usize {
        self.sizes.len()
    }

    /// Partition size on `device` (0 for devices outside the mapping).
    #[inline]
    pub fn size(&self, device: usize) -> usize {
        self.sizes.get(device).copied().unwrap_or(0)
    }

    /// Start of `device`'s partition in the logical array.
    pub fn offset(&self, device: usize) -> usize {
        self.sizes.iter().take(device).sum()
    }

    /// Per-device partition sizes.
    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Total number of elements across all partitions.
    pub fn len(&self) -> usize {
        self.sizes.iter().sum()
    }

    /// Returns `true` if no device holds any element.
    pub fn is_empty(&self) -> bool {
        self.sizes.iter().all(|&s| s == 0)
    }

    /// Devices whose partition holds at least one element.
    pub fn non_empty_devices(&self) -> impl Iterator<Item = usize> + '_ {
        self.sizes
            .iter()
            .enumerate()
            .filter(|&(_, &size)| size > 0)
            .map(|(device, _)| device)
    }
}
