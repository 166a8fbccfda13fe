use std::ops::Range;

/// 1024 matrices of 64 bytes fill exactly the 64 KiB default uniform binding limit.
/// Must match the `ModelBatch` array length in `assets/shaders/shared/letter.wgsl`.
pub const MAX_BATCH_SIZE: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub index: u32,
    pub start: u32,
    pub count: u32,
}

impl Batch {
    pub fn range(&self) -> Range<usize> {
        self.start as usize..(self.start + self.count) as usize
    }
}

/// Splits `instance_count` objects into contiguous batches of at most `batch_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLayout {
    instance_count: u32,
    batch_size: u32,
}

impl BatchLayout {
    pub fn new(instance_count: u32, batch_size: u32) -> anyhow::Result<Self> {
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            anyhow::bail!(
                "Batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE,
                batch_size
            );
        }

        Ok(Self {
            instance_count,
            batch_size,
        })
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    pub fn batch_count(&self) -> u32 {
        self.instance_count.div_ceil(self.batch_size)
    }

    pub fn batch(&self, index: u32) -> Option<Batch> {
        if index >= self.batch_count() {
            return None;
        }

        let start = index * self.batch_size;
        Some(Batch {
            index,
            start,
            count: self.batch_size.min(self.instance_count - start),
        })
    }

    pub fn batches(&self) -> impl Iterator<Item = Batch> + '_ {
        (0..self.batch_count()).filter_map(|index| self.batch(index))
    }

    /// Returns `(batch, slot)` for an instance.
    #[allow(dead_code)]
    pub fn locate(&self, instance: u32) -> Option<(u32, u32)> {
        (instance < self.instance_count)
            .then(|| (instance / self.batch_size, instance % self.batch_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        let layout = BatchLayout::new(4096, 1024).unwrap();
        assert_eq!(layout.batch_count(), 4);

        let batches: Vec<_> = layout.batches().collect();
        assert_eq!(batches.len(), 4);
        assert!(batches.iter().all(|batch| batch.count == 1024));
        assert_eq!(batches[3].start, 3072);
    }

    #[test]
    fn last_batch_holds_remainder() {
        let layout = BatchLayout::new(4097, 1024).unwrap();
        assert_eq!(layout.batch_count(), 5);
        assert_eq!(
            layout.batch(4),
            Some(Batch {
                index: 4,
                start: 4096,
                count: 1
            })
        );
        assert_eq!(layout.batch(5), None);
    }

    #[test]
    fn batches_cover_every_instance_once() {
        let layout = BatchLayout::new(2500, 300).unwrap();

        let mut next = 0;
        for batch in layout.batches() {
            assert_eq!(batch.start, next);
            assert!(batch.count > 0 && batch.count <= 300);
            next += batch.count;
        }
        assert_eq!(next, 2500);
    }

    #[test]
    fn no_instances_means_no_batches() {
        let layout = BatchLayout::new(0, 1024).unwrap();
        assert_eq!(layout.batch_count(), 0);
        assert_eq!(layout.batches().count(), 0);
        assert_eq!(layout.locate(0), None);
    }

    #[test]
    fn rejects_invalid_batch_sizes() {
        assert!(BatchLayout::new(10, 0).is_err());
        assert!(BatchLayout::new(10, MAX_BATCH_SIZE + 1).is_err());
    }

    #[test]
    fn locate_matches_batches() {
        let layout = BatchLayout::new(4096, 1024).unwrap();
        assert_eq!(layout.locate(0), Some((0, 0)));
        assert_eq!(layout.locate(1023), Some((0, 1023)));
        assert_eq!(layout.locate(1024), Some((1, 0)));
        assert_eq!(layout.locate(4095), Some((3, 1023)));
        assert_eq!(layout.locate(4096), None);
    }

    #[test]
    fn batch_range_indexes_matrices() {
        let layout = BatchLayout::new(10, 4).unwrap();
        let ranges: Vec<_> = layout.batches().map(|batch| batch.range()).collect();
        assert_eq!(ranges, vec![0..4, 4..8, 8..10]);
    }
}
