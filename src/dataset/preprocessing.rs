use std::path::Path;

use image::{GrayImage, Rgb, RgbImage};

use super::DatasetError;

/// A color image as decoded from disk plus its `[0, 1]` normalized pixels
/// in row-major `[height, width, 3]` order.
///
/// `pixels` are in B, G, R channel order, the layout models are trained on;
/// `original` stays RGB for rendering.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub original: RgbImage,
    pub pixels: Vec<f32>,
}

/// A grayscale mask as decoded from disk plus its evaluation labels.
///
/// Labels are `value / 255` truncated to an integer, so only fully white
/// pixels count as foreground.
#[derive(Debug, Clone)]
pub struct DecodedMask {
    pub original: GrayImage,
    pub labels: Vec<u8>,
}

pub fn read_image<P: AsRef<Path>>(path: P, size: [usize; 2]) -> Result<DecodedImage, DatasetError> {
    let path = path.as_ref();
    let original = image::open(path)
        .map_err(|source| DatasetError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .into_rgb8();

    check_size(path, original.height(), original.width(), size)?;

    let pixels = original
        .pixels()
        .flat_map(|&Rgb([r, g, b])| [b, g, r])
        .map(normalize)
        .collect();

    Ok(DecodedImage { original, pixels })
}

/// Training mask: `[0, 1]` floats with one channel, `[1, height, width]`.
pub fn read_mask<P: AsRef<Path>>(path: P, size: [usize; 2]) -> Result<Vec<f32>, DatasetError> {
    let mask = decode_gray(path.as_ref(), size)?;

    Ok(mask.as_raw().iter().map(|&v| normalize(v)).collect())
}

/// Evaluation mask: the raw grayscale image and its `{0, 1}` labels.
pub fn read_eval_mask<P: AsRef<Path>>(
    path: P,
    size: [usize; 2],
) -> Result<DecodedMask, DatasetError> {
    let original = decode_gray(path.as_ref(), size)?;
    let labels = original
        .as_raw()
        .iter()
        .map(|&v| normalize(v) as u8)
        .collect();

    Ok(DecodedMask { original, labels })
}

/// `p > threshold` as `{0, 1}` labels.
pub fn threshold(probabilities: &[f32], threshold: f32) -> Vec<u8> {
    probabilities
        .iter()
        .map(|&p| u8::from(p > threshold))
        .collect()
}

fn decode_gray(path: &Path, size: [usize; 2]) -> Result<GrayImage, DatasetError> {
    let mask = image::open(path)
        .map_err(|source| DatasetError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .into_luma8();

    check_size(path, mask.height(), mask.width(), size)?;

    Ok(mask)
}

fn normalize(value: u8) -> f32 {
    value as f32 / 255.0
}

fn check_size(path: &Path, height: u32, width: u32, size: [usize; 2]) -> Result<(), DatasetError> {
    let found = [height as usize, width as usize];
    if found != size {
        return Err(DatasetError::Size {
            path: path.to_path_buf(),
            expected: size,
            found,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn image_pixels_are_normalized() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("img.png");
        RgbImage::from_fn(4, 2, |x, y| Rgb([(x * 60) as u8, (y * 255) as u8, 255]))
            .save(&path)
            .unwrap();

        let decoded = read_image(&path, [2, 4]).unwrap();

        assert_eq!(decoded.pixels.len(), 2 * 4 * 3);
        assert!(decoded.pixels.iter().all(|v| (0.0..=1.0).contains(v)));
        // pixel (1, 0) is RGB (60, 0, 255); pixels hold it as B, G, R
        assert_eq!(decoded.pixels[3], 1.0);
        assert_eq!(decoded.pixels[4], 0.0);
        assert!((decoded.pixels[5] - 60.0 / 255.0).abs() < 1e-6);
        // pixel (0, 1) is RGB (0, 255, 255)
        assert_eq!(&decoded.pixels[12..15], &[1.0, 1.0, 0.0]);
        assert_eq!(decoded.original.get_pixel(1, 0), &Rgb([60, 0, 255]));
    }

    #[test]
    fn masks_are_scaled_for_training_and_truncated_for_evaluation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mask.png");
        GrayImage::from_raw(3, 1, vec![0, 128, 255])
            .unwrap()
            .save(&path)
            .unwrap();

        let train = read_mask(&path, [1, 3]).unwrap();
        let eval = read_eval_mask(&path, [1, 3]).unwrap();

        assert_eq!(train[0], 0.0);
        assert!((train[1] - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(train[2], 1.0);
        assert_eq!(eval.labels, [0, 0, 1]);
        assert_eq!(eval.original.get_pixel(1, 0), &Luma([128]));
    }

    #[test]
    fn size_mismatch_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mask.png");
        GrayImage::new(8, 8).save(&path).unwrap();

        let err = read_mask(&path, [16, 16]).unwrap_err();

        assert!(matches!(
            err,
            DatasetError::Size {
                expected: [16, 16],
                found: [8, 8],
                ..
            }
        ));
    }

    #[test]
    fn unreadable_file_is_a_decode_error() {
        let tmp = tempfile::tempdir().unwrap();

        let err = read_image(tmp.path().join("missing.jpg"), [8, 8]).unwrap_err();

        assert!(matches!(err, DatasetError::Decode { .. }));
    }

    #[test]
    fn threshold_is_idempotent_on_binary_masks() {
        let once = threshold(&[0.2, 0.5, 0.51, 0.9], 0.5);
        let as_probabilities: Vec<f32> = once.iter().map(|&v| v as f32).collect();

        assert_eq!(once, [0, 0, 1, 1]);
        assert_eq!(threshold(&as_probabilities, 0.5), once);
    }
}
