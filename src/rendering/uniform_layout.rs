use bytemuck::{Pod, Zeroable};
use glam::Mat4;

pub const MATRIX_SIZE: u64 = std::mem::size_of::<Mat4>() as u64;

pub fn align_to(size: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (size + alignment - 1) & !(alignment - 1)
}

/// Scalar matrix index, padded to the 16 byte minimum of a uniform struct.
/// This should match `ObjectIndex` in `uniform_index.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ObjectIndex {
    pub index: u32,
    _padding: [u32; 3],
}

impl ObjectIndex {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(index: u32) -> Self {
        Self {
            index,
            _padding: [0; 3],
        }
    }
}

/// `count` uniform slots addressed through dynamic offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSlots {
    stride: u64,
    count: u32,
}

impl ObjectSlots {
    /// Fails if the slots span more than a `u32` dynamic offset can address.
    pub fn new(element_size: u64, count: u32, min_offset_alignment: u64) -> anyhow::Result<Self> {
        let slots = Self {
            stride: align_to(element_size, min_offset_alignment),
            count,
        };

        if u32::try_from(slots.buffer_size()).is_err() {
            anyhow::bail!(
                "{} uniform slots of {} bytes exceed the dynamic offset range",
                count,
                slots.stride
            );
        }

        Ok(slots)
    }

    /// Fails if the backing buffer would be larger than the device allows.
    pub fn check_buffer_limit(&self, max_buffer_size: u64) -> anyhow::Result<()> {
        if self.buffer_size() > max_buffer_size {
            anyhow::bail!(
                "{} uniform slots of {} bytes need a {} byte buffer, the device allows {}",
                self.count,
                self.stride,
                self.buffer_size(),
                max_buffer_size
            );
        }

        Ok(())
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Buffer size, never zero so that empty scenes still get a valid buffer.
    pub fn buffer_size(&self) -> u64 {
        self.stride * u64::from(self.count.max(1))
    }

    /// Dynamic offset of `slot`, or `None` past the last slot.
    pub fn offset(&self, slot: u32) -> Option<u32> {
        if slot >= self.count {
            return None;
        }

        u32::try_from(u64::from(slot) * self.stride).ok()
    }

    /// Writes each element at the start of its slot into `out`, leaving the padding zeroed.
    pub fn pack<T: Pod>(&self, elements: &[T], out: &mut Vec<u8>) {
        let stride = self.stride as usize;
        out.clear();
        out.resize(stride * elements.len(), 0);

        for (slot, element) in out.chunks_exact_mut(stride).zip(elements) {
            let bytes = bytemuck::bytes_of(element);
            slot[..bytes.len()].copy_from_slice(bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(64, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(64, 32), 64);
    }

    #[test]
    fn matrix_slots_follow_device_alignment() {
        let slots = ObjectSlots::new(MATRIX_SIZE, 4096, 256).unwrap();
        assert_eq!(slots.stride(), 256);
        assert_eq!(slots.offset(3), Some(768));
        assert_eq!(slots.offset(4095), Some(4095 * 256));
        assert_eq!(slots.offset(4096), None);
        assert_eq!(slots.buffer_size(), 4096 * 256);

        let tight = ObjectSlots::new(MATRIX_SIZE, 4096, 32).unwrap();
        assert_eq!(tight.stride(), 64);
    }

    #[test]
    fn empty_slots_still_have_a_buffer() {
        let slots = ObjectSlots::new(MATRIX_SIZE, 0, 256).unwrap();
        assert_eq!(slots.buffer_size(), 256);
        assert_eq!(slots.offset(0), None);
    }

    #[test]
    fn slots_beyond_offset_range_are_rejected() {
        // 16 Mi slots of 256 bytes would wrap the last offsets to zero.
        assert!(ObjectSlots::new(MATRIX_SIZE, 1 << 24, 256).is_err());
        assert!(ObjectSlots::new(MATRIX_SIZE, (1 << 24) - 1, 256).is_ok());
    }

    #[test]
    fn buffer_limit_is_checked() {
        let max_buffer_size = 256 << 20;

        let fits = ObjectSlots::new(MATRIX_SIZE, 1 << 20, 256).unwrap();
        assert!(fits.check_buffer_limit(max_buffer_size).is_ok());

        let too_big = ObjectSlots::new(MATRIX_SIZE, 2_000_000, 256).unwrap();
        assert!(too_big.check_buffer_limit(max_buffer_size).is_err());
    }

    #[test]
    fn pack_places_matrices_at_slot_offsets() {
        let slots = ObjectSlots::new(MATRIX_SIZE, 2, 256).unwrap();
        let matrices = [Mat4::IDENTITY, Mat4::from_translation(glam::Vec3::X * 5.0)];

        let mut bytes = Vec::new();
        slots.pack(&matrices, &mut bytes);

        assert_eq!(bytes.len(), 512);
        let second: [f32; 16] =
            bytemuck::pod_read_unaligned(&bytes[256..256 + MATRIX_SIZE as usize]);
        assert_eq!(second, matrices[1].to_cols_array());
        assert!(bytes[64..256].iter().all(|&b| b == 0));
    }

    #[test]
    fn object_index_is_uniform_sized() {
        assert_eq!(ObjectIndex::SIZE, 16);
        let index = ObjectIndex::new(7);
        assert_eq!(&bytemuck::bytes_of(&index)[..4], &7u32.to_ne_bytes());
    }
}
