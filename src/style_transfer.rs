//! Image-to-image translation applied before analysis.
//!
//! The analyzer only relies on the output format: a three-channel image of
//! [`StyleTransfer::output_size`]. Implementations shared through
//! [`crate::VadaAnalyzer`] must be reentrant; stateful ones go behind
//! [`Serialized`].

use image::{DynamicImage, RgbImage, imageops::FilterType};
use parking_lot::Mutex;

use crate::error::Result;

pub const TRANSLATED_SIZE: u32 = 256;

pub trait StyleTransfer: Send + Sync {
    fn transfer(&self, image: &DynamicImage) -> Result<RgbImage>;

    /// Fixed output dimensions, or `None` when the input size is kept.
    fn output_size(&self) -> Option<(u32, u32)>;

    fn name(&self) -> &str;
}

/// A translation model that needs exclusive access while evaluating.
pub trait StatefulTransfer: Send {
    fn transfer_mut(&mut self, image: &DynamicImage) -> Result<RgbImage>;

    fn output_size(&self) -> Option<(u32, u32)>;

    fn name(&self) -> &str;
}

/// Resizes to the translation network's fixed frame without restyling.
pub struct ResizeTransfer {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl ResizeTransfer {
    pub fn new() -> Self {
        Self {
            width: TRANSLATED_SIZE,
            height: TRANSLATED_SIZE,
            filter: FilterType::Triangle,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

impl Default for ResizeTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleTransfer for ResizeTransfer {
    fn transfer(&self, image: &DynamicImage) -> Result<RgbImage> {
        Ok(image.resize_exact(self.width, self.height, self.filter).to_rgb8())
    }

    fn output_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn name(&self) -> &str {
        "resize"
    }
}

/// Analyzes images exactly as loaded, for inputs that were already translated.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl StyleTransfer for Passthrough {
    fn transfer(&self, image: &DynamicImage) -> Result<RgbImage> {
        Ok(image.to_rgb8())
    }

    fn output_size(&self) -> Option<(u32, u32)> {
        None
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Shares a [`StatefulTransfer`] by running one evaluation at a time.
pub struct Serialized<T> {
    inner: Mutex<T>,
    name: String,
}

impl<T: StatefulTransfer> Serialized<T> {
    pub fn new(inner: T) -> Self {
        let name = format!("serialized({})", inner.name());
        Self {
            inner: Mutex::new(inner),
            name,
        }
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: StatefulTransfer> StyleTransfer for Serialized<T> {
    fn transfer(&self, image: &DynamicImage) -> Result<RgbImage> {
        self.inner.lock().transfer_mut(image)
    }

    fn output_size(&self) -> Option<(u32, u32)> {
        self.inner.lock().output_size()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rayon::prelude::*;

    struct Counting {
        calls: usize,
    }

    impl StatefulTransfer for Counting {
        fn transfer_mut(&mut self, image: &DynamicImage) -> Result<RgbImage> {
            self.calls += 1;
            Ok(image.to_rgb8())
        }

        fn output_size(&self) -> Option<(u32, u32)> {
            None
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_resize_transfer_output_size() {
        let input = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([1, 2, 3])));
        let transfer = ResizeTransfer::new();
        let output = transfer.transfer(&input).unwrap();
        assert_eq!(output.dimensions(), (256, 256));
        assert_eq!(transfer.output_size(), Some((256, 256)));
        assert_eq!(output.get_pixel(10, 10), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_filter_is_forwarded_to_resize() {
        let mut source = RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]));
        for y in 0..8 {
            for x in 3..8 {
                source.put_pixel(x, y, Rgb([200, 100, 50]));
            }
        }
        let source = DynamicImage::ImageRgb8(source);
        let transfer = ResizeTransfer::new()
            .with_size(5, 3)
            .with_filter(FilterType::Nearest);
        let output = transfer.transfer(&source).unwrap();

        assert_eq!(output.dimensions(), (5, 3));
        assert_eq!(output, source.resize_exact(5, 3, FilterType::Nearest).to_rgb8());
    }

    #[test]
    fn test_passthrough_keeps_pixels() {
        let input = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 20, Rgb([9, 8, 7])));
        let output = Passthrough.transfer(&input).unwrap();
        assert_eq!(output.dimensions(), (30, 20));
        assert_eq!(Passthrough.output_size(), None);
    }

    #[test]
    fn test_serialized_transfer_is_shareable() {
        let shared = Serialized::new(Counting { calls: 0 });
        let input = DynamicImage::ImageRgb8(RgbImage::new(4, 4));

        (0..16).into_par_iter().for_each(|_| {
            shared.transfer(&input).unwrap();
        });

        assert_eq!(shared.name(), "serialized(counting)");
        assert_eq!(shared.into_inner().calls, 16);
    }
}
