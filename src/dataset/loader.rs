use std::path::{Path, PathBuf};

use derive_new::new;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::DatasetError;

pub const IMAGE_DIR: &str = "image";
pub const MASK_DIR: &str = "mask";
pub const EXTENSION: &str = "jpg";

#[derive(new, Clone, Debug, PartialEq, Eq)]
pub struct SamplePair {
    pub image_path: PathBuf,
    pub mask_path: PathBuf,
}

impl SamplePair {
    /// File name of the image up to its first dot.
    pub fn name(&self) -> String {
        file_stem(&self.image_path)
    }
}

/// Lists `<split_root>/image/*.jpg` and `<split_root>/mask/*.jpg`, each sorted.
///
/// A missing or empty directory yields an empty list.
pub fn load_data<P: AsRef<Path>>(split_root: P) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let root = split_root.as_ref();

    (
        list_sorted(&root.join(IMAGE_DIR)),
        list_sorted(&root.join(MASK_DIR)),
    )
}

/// Zips sorted image and mask lists, requiring equal lengths and matching
/// file stems at every position.
pub fn pair_samples(
    images: Vec<PathBuf>,
    masks: Vec<PathBuf>,
) -> Result<Vec<SamplePair>, DatasetError> {
    if images.len() != masks.len() {
        return Err(DatasetError::CountMismatch {
            images: images.len(),
            masks: masks.len(),
        });
    }

    images
        .into_iter()
        .zip(masks)
        .map(|(image_path, mask_path)| {
            if file_stem(&image_path) != file_stem(&mask_path) {
                return Err(DatasetError::StemMismatch {
                    image: image_path,
                    mask: mask_path,
                });
            }

            Ok(SamplePair::new(image_path, mask_path))
        })
        .collect()
}

pub fn load_split<P: AsRef<Path>>(split_root: P) -> Result<Vec<SamplePair>, DatasetError> {
    let (images, masks) = load_data(split_root);
    pair_samples(images, masks)
}

/// Seeded in-place shuffle; the same seed always gives the same order.
pub fn shuffle_pairs(pairs: &mut [SamplePair], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    pairs.shuffle(&mut rng);
}

fn list_sorted(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == EXTENSION)
        })
        .collect();

    paths.sort();
    paths
}

fn file_stem(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| name.split('.').next().map(str::to_string))
        .unwrap_or_default()
}
