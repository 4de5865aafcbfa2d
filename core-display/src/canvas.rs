//! `embedded-graphics` draw target over a [`MonoBitmap`]

use bridge_traits::MonoBitmap;
use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::{DrawTarget, OriginDimensions, Pixel, Size},
};
use std::convert::Infallible;

/// Frame buffer the layouts draw into.
///
/// `BinaryColor::On` is ink (black), `BinaryColor::Off` is paper (white).
/// Pixels outside the panel are clipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    bitmap: MonoBitmap,
}

impl Canvas {
    /// Blank (all white) canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            bitmap: MonoBitmap::new(width, height),
        }
    }

    pub fn bitmap(&self) -> &MonoBitmap {
        &self.bitmap
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    /// Reset to white.
    pub fn wipe(&mut self) {
        self.bitmap.clear();
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.bitmap.width(), self.bitmap.height())
    }
}

impl DrawTarget for Canvas {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = (self.bitmap.width(), self.bitmap.height());
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x < width && y < height {
                self.bitmap.set_pixel(x, y, color.is_on());
            }
        }
        Ok(())
    }
}
