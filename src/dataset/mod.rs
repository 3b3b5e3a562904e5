mod loader;
pub mod preprocessing;
mod segmentation;

use std::path::PathBuf;

use thiserror::Error;

pub use loader::{
    EXTENSION, IMAGE_DIR, MASK_DIR, SamplePair, load_data, load_split, pair_samples,
    shuffle_pairs,
};
pub use segmentation::{
    SegmentationBatch, SegmentationBatcher, SegmentationDataset, SegmentationItem,
    steps_per_epoch,
};

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("{path:?} is {found:?} (height, width), expected {expected:?}")]
    Size {
        path: PathBuf,
        expected: [usize; 2],
        found: [usize; 2],
    },

    #[error("Found {images} images but {masks} masks")]
    CountMismatch { images: usize, masks: usize },

    #[error("Image {image:?} is paired with mask {mask:?}")]
    StemMismatch { image: PathBuf, mask: PathBuf },

    #[error("No sample at index {0}")]
    OutOfBounds(usize),

    #[error("Loader produced {found} of {expected} samples")]
    Incomplete { expected: usize, found: usize },
}
