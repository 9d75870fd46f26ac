pub mod image_helper {
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, GrayImage, ImageEncoder};
    use std::path::Path;

    /// Writes a binary or grayscale mask as an 8-bit PNG.
    pub fn save_mask(path: &Path, mask: &GrayImage) -> Result<(), image::error::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = PngEncoder::new(output);

        encoder.write_image(mask.as_raw(), mask.width(), mask.height(), ExtendedColorType::L8)?;

        Ok(())
    }

    /// File name used for the mask of frame `index`.
    pub fn mask_file_name(index: u64) -> String {
        format!("mask_{index:06}.png")
    }
}
