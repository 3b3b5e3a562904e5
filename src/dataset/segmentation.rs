use std::sync::{Arc, Mutex};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};
use tracing::error;

use super::{
    DatasetError, SamplePair,
    preprocessing::{read_image, read_mask},
};

/// One decoded training sample, still on the host.
#[derive(Debug, Clone)]
pub struct SegmentationItem {
    /// `[height, width, 3]` in `[0, 1]`, channels in B, G, R order.
    pub image: Vec<f32>,
    /// `[height, width]` in `[0, 1]`.
    pub mask: Vec<f32>,
    pub height: usize,
    pub width: usize,
}

/// Number of batches for `num_samples` when the last batch may be short.
pub fn steps_per_epoch(num_samples: usize, batch_size: usize) -> usize {
    num_samples.div_ceil(batch_size)
}

/// Image/mask pairs decoded lazily, one index at a time.
///
/// Burn's data loader only sees `None` for a sample that fails to decode, so
/// the first such error is kept and handed back by [`Self::finish_epoch`].
/// Clones share that slot.
#[derive(Debug, Clone)]
pub struct SegmentationDataset {
    pairs: Vec<SamplePair>,
    image_size: [usize; 2],
    failure: Arc<Mutex<Option<DatasetError>>>,
}

impl SegmentationDataset {
    pub fn new(pairs: Vec<SamplePair>, image_size: [usize; 2]) -> Self {
        Self {
            pairs,
            image_size,
            failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn load(&self, index: usize) -> Result<SegmentationItem, DatasetError> {
        let pair = self
            .pairs
            .get(index)
            .ok_or(DatasetError::OutOfBounds(index))?;
        let [height, width] = self.image_size;

        let image = read_image(&pair.image_path, self.image_size)?.pixels;
        let mask = read_mask(&pair.mask_path, self.image_size)?;

        Ok(SegmentationItem {
            image,
            mask,
            height,
            width,
        })
    }

    pub fn pairs(&self) -> &[SamplePair] {
        &self.pairs
    }

    /// Checks a pass over the dataset that consumed `samples` items.
    ///
    /// Returns the first decode error recorded since the last call, or
    /// [`DatasetError::Incomplete`] when the loader stopped short for any
    /// other reason.
    pub fn finish_epoch(&self, samples: usize) -> Result<(), DatasetError> {
        let failure = match self.failure.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(err) = failure {
            return Err(err);
        }

        if samples != self.pairs.len() {
            return Err(DatasetError::Incomplete {
                expected: self.pairs.len(),
                found: samples,
            });
        }

        Ok(())
    }

    fn record_failure(&self, err: DatasetError) {
        error!("{err}");

        let mut slot = match self.failure.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.get_or_insert(err);
    }
}

impl Dataset<SegmentationItem> for SegmentationDataset {
    fn get(&self, index: usize) -> Option<SegmentationItem> {
        // The loader probes one index past the end to detect exhaustion.
        if index >= self.pairs.len() {
            return None;
        }

        match self.load(index) {
            Ok(item) => Some(item),
            Err(err) => {
                self.record_failure(err);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}

#[derive(Clone)]
pub struct SegmentationBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SegmentationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

#[derive(Clone, Debug)]
pub struct SegmentationBatch<B: Backend> {
    /// `[batch, 3, height, width]`
    pub images: Tensor<B, 4>,
    /// `[batch, 1, height, width]`
    pub masks: Tensor<B, 4>,
}

impl<B: Backend> Batcher<SegmentationItem, SegmentationBatch<B>> for SegmentationBatcher<B> {
    fn batch(&self, items: Vec<SegmentationItem>) -> SegmentationBatch<B> {
        let batch_size = items.len();

        let mut images = Vec::with_capacity(batch_size);
        let mut masks = Vec::with_capacity(batch_size);

        for item in items {
            let image_tensor = Tensor::<B, 3>::from_data(
                TensorData::new(item.image, Shape::new([item.height, item.width, 3]))
                    .convert::<B::FloatElem>(),
                &self.device,
            )
            .permute([2, 0, 1]);

            let mask_tensor = Tensor::<B, 3>::from_data(
                TensorData::new(item.mask, Shape::new([1, item.height, item.width]))
                    .convert::<B::FloatElem>(),
                &self.device,
            );

            images.push(image_tensor);
            masks.push(mask_tensor);
        }

        let images: Tensor<B, 4> = Tensor::stack::<4>(images, 0);
        let masks: Tensor<B, 4> = Tensor::stack::<4>(masks, 0);

        SegmentationBatch { images, masks }
    }
}
