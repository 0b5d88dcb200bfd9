use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use image::imageops::FilterType;
use image::DynamicImage;

/// Resize-and-crop `image` to `size`×`size` and scale pixels to `[-1, 1]`,
/// returning a `[3, size, size]` tensor.
pub fn image_to_tensor(image: &DynamicImage, size: usize, device: &Device) -> Result<Tensor> {
    let side = u32::try_from(size)?;
    let rgb = image.resize_to_fill(side, side, FilterType::Triangle).to_rgb8();
    let tensor = Tensor::from_vec(rgb.into_raw(), (size, size, 3), device)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        .affine(2. / 255., -1.)?;
    Ok(tensor)
}

/// Stack a batch of images into a `[B, 3, size, size]` tensor.
pub fn images_to_batch(images: &[DynamicImage], size: usize, device: &Device) -> Result<Tensor> {
    let tensors = images
        .iter()
        .map(|img| image_to_tensor(img, size, device))
        .collect::<Result<Vec<_>>>()?;
    Ok(Tensor::stack(&tensors, 0)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn batch_has_channels_first_layout() {
        let a = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([255, 0, 0])));
        let b = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 80, Rgb([0, 0, 255])));
        let batch = images_to_batch(&[a, b], 16, &Device::Cpu).unwrap();
        assert_eq!(batch.dims(), &[2, 3, 16, 16]);
    }

    #[test]
    fn pixels_are_scaled_to_unit_range() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])));
        let t = image_to_tensor(&white, 4, &Device::Cpu).unwrap();
        let values = t.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(values.len(), 3 * 4 * 4);
        for v in values { assert!((v - 1.0).abs() < 1e-5); }
    }
}
