#![allow(dead_code)]

use std::path::Path;

use burn::prelude::*;
use burn_segmentation::{SegmentationModel, dataset::{IMAGE_DIR, MASK_DIR}};
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Writes `count` image/mask jpg pairs of `size x size` under
/// `<root>/<split>/`. Sample `i` has a white square in its top-left corner
/// covering `i + 1` rows.
pub fn write_split(root: &Path, split: &str, count: usize, size: u32) {
    let image_dir = root.join(split).join(IMAGE_DIR);
    let mask_dir = root.join(split).join(MASK_DIR);
    std::fs::create_dir_all(&image_dir).unwrap();
    std::fs::create_dir_all(&mask_dir).unwrap();

    for i in 0..count {
        let rows = i as u32 + 1;
        let inside = |x: u32, y: u32| x < size / 2 && y < rows;

        RgbImage::from_fn(size, size, |x, y| {
            if inside(x, y) {
                Rgb([230, 200, 180])
            } else {
                Rgb([20, 30, 40])
            }
        })
        .save(image_dir.join(format!("sample_{i}.jpg")))
        .unwrap();

        GrayImage::from_fn(size, size, |x, y| Luma([if inside(x, y) { 255 } else { 0 }]))
            .save(mask_dir.join(format!("sample_{i}.jpg")))
            .unwrap();
    }
}

/// Writes one pair whose left half is foreground, in both image and mask.
pub fn write_half_sample(root: &Path, split: &str, name: &str, size: u32) {
    let image_dir = root.join(split).join(IMAGE_DIR);
    let mask_dir = root.join(split).join(MASK_DIR);
    std::fs::create_dir_all(&image_dir).unwrap();
    std::fs::create_dir_all(&mask_dir).unwrap();

    RgbImage::from_fn(size, size, |x, _| {
        if x < size / 2 {
            Rgb([230, 200, 180])
        } else {
            Rgb([20, 30, 40])
        }
    })
    .save(image_dir.join(format!("{name}.jpg")))
    .unwrap();
    GrayImage::from_fn(size, size, |x, _| Luma([if x < size / 2 { 255 } else { 0 }]))
        .save(mask_dir.join(format!("{name}.jpg")))
        .unwrap();
}

/// Values of `column` in a CSV log, one per row.
pub fn csv_column(path: &Path, column: &str) -> Vec<f64> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let index = reader
        .headers()
        .unwrap()
        .iter()
        .position(|name| name == column)
        .unwrap();

    reader
        .records()
        .map(|record| record.unwrap()[index].parse().unwrap())
        .collect()
}

/// Writes a single all-black image with an all-black mask.
pub fn write_blank_sample(root: &Path, split: &str, name: &str, size: u32) {
    let image_dir = root.join(split).join(IMAGE_DIR);
    let mask_dir = root.join(split).join(MASK_DIR);
    std::fs::create_dir_all(&image_dir).unwrap();
    std::fs::create_dir_all(&mask_dir).unwrap();

    RgbImage::new(size, size)
        .save(image_dir.join(format!("{name}.jpg")))
        .unwrap();
    GrayImage::new(size, size)
        .save(mask_dir.join(format!("{name}.jpg")))
        .unwrap();
}

/// Predicts background everywhere.
pub struct BackgroundModel;

impl<B: Backend> SegmentationModel<B> for BackgroundModel {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, _, height, width] = images.dims();
        Tensor::zeros([batch, 1, height, width], &images.device())
    }
}

pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
