use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};

const GUTTER: Rgb<u8> = Rgb([255, 255, 255]);

/// Turns `{0, 1}` labels into a black and white mask image.
pub fn prediction_image(labels: &[u8], width: u32, height: u32) -> Option<GrayImage> {
    GrayImage::from_raw(
        width,
        height,
        labels.iter().map(|&label| label.saturating_mul(255)).collect(),
    )
}

/// Lays out `image | gutter | mask | gutter | prediction` side by side.
///
/// Panels are expected to share the height of `image`; rows outside a
/// smaller panel are left white.
pub fn triptych(
    image: &RgbImage,
    mask: &GrayImage,
    prediction: &GrayImage,
    gutter_width: u32,
) -> RgbImage {
    let height = image.height();
    let mask_x = image.width() + gutter_width;
    let prediction_x = mask_x + mask.width() + gutter_width;
    let width = prediction_x + prediction.width();

    let gray = |panel: &GrayImage, x: u32, y: u32| {
        let Luma([value]) = *panel.get_pixel_checked(x, y)?;
        Some(Rgb([value, value, value]))
    };

    RgbImage::from_fn(width, height, |x, y| {
        let pixel = if x < image.width() {
            Some(*image.get_pixel(x, y))
        } else if (mask_x..mask_x + mask.width()).contains(&x) {
            gray(mask, x - mask_x, y)
        } else if x >= prediction_x {
            gray(prediction, x - prediction_x, y)
        } else {
            None
        };

        pixel.unwrap_or(GUTTER)
    })
}

pub fn save_triptych<P: AsRef<Path>>(
    path: P,
    image: &RgbImage,
    mask: &GrayImage,
    prediction: &GrayImage,
    gutter_width: u32,
) -> image::ImageResult<()> {
    triptych(image, mask, prediction, gutter_width).save(path)
}
