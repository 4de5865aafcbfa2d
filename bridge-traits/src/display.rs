//! Display bridge traits and the monochrome frame buffer type.

use crate::error::{BridgeError, Result};

/// 1-bit-per-pixel frame buffer.
///
/// Rows are stored top to bottom, each row padded to a whole number of bytes.
/// Within a byte the most significant bit is the leftmost pixel. A set bit is a
/// white (unlit) pixel, a cleared bit is black ink, matching the panel's wire
/// format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoBitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl MonoBitmap {
    /// Create an all-white bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        let len = Self::row_stride(width) * height as usize;
        Self {
            width,
            height,
            data: vec![0xFF; len],
        }
    }

    /// Wrap an existing buffer, validating its length.
    pub fn from_bytes(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = Self::row_stride(width) * height as usize;
        if data.len() != expected {
            return Err(BridgeError::OperationFailed(format!(
                "bitmap buffer for {}x{} must be {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Bytes per row.
    pub fn row_stride(width: u32) -> usize {
        (width as usize).div_ceil(8)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Reset every pixel to white.
    pub fn clear(&mut self) {
        self.data.fill(0xFF);
    }

    /// Set a pixel; `black == true` inks it. Out-of-range writes are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, black: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = y as usize * Self::row_stride(self.width) + (x / 8) as usize;
        let mask = 0x80u8 >> (x % 8);
        if black {
            self.data[index] &= !mask;
        } else {
            self.data[index] |= mask;
        }
    }

    /// Whether the pixel is black. Out-of-range reads are white.
    pub fn is_black(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let index = y as usize * Self::row_stride(self.width) + (x / 8) as usize;
        let mask = 0x80u8 >> (x % 8);
        self.data[index] & mask == 0
    }

    /// Number of black pixels in the bitmap.
    pub fn black_pixel_count(&self) -> usize {
        let mut count = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.is_black(x, y) {
                    count += 1;
                }
            }
        }
        count
    }
}

/// Physical or simulated monochrome panel.
///
/// `render` blocks until the panel has accepted the frame or failed. A partial
/// refresh (`full_refresh == false`) lets slow e-paper panels update without the
/// full flashing cycle; the whole frame is still sent.
#[async_trait::async_trait]
pub trait DisplayDriver: Send + Sync {
    /// Panel size in pixels as `(width, height)`.
    fn dimensions(&self) -> (u32, u32);

    async fn render(&self, bitmap: &MonoBitmap, full_refresh: bool) -> Result<()>;

    /// Put the panel into its low-power state.
    async fn sleep(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bitmap_is_white_and_row_padded() {
        let bitmap = MonoBitmap::new(250, 122);
        assert_eq!(MonoBitmap::row_stride(250), 32);
        assert_eq!(bitmap.as_bytes().len(), 32 * 122);
        assert_eq!(bitmap.black_pixel_count(), 0);
    }

    #[test]
    fn set_pixel_uses_msb_first_order() {
        let mut bitmap = MonoBitmap::new(16, 2);
        bitmap.set_pixel(0, 0, true);
        bitmap.set_pixel(9, 1, true);

        assert_eq!(bitmap.as_bytes()[0], 0x7F);
        assert_eq!(bitmap.as_bytes()[3], 0xBF);
        assert!(bitmap.is_black(0, 0));
        assert!(bitmap.is_black(9, 1));
        assert!(!bitmap.is_black(1, 0));

        bitmap.set_pixel(0, 0, false);
        assert!(!bitmap.is_black(0, 0));
    }

    #[test]
    fn out_of_range_pixels_are_ignored() {
        let mut bitmap = MonoBitmap::new(8, 8);
        bitmap.set_pixel(8, 0, true);
        bitmap.set_pixel(0, 8, true);
        assert_eq!(bitmap.black_pixel_count(), 0);
        assert!(!bitmap.is_black(100, 100));
    }

    #[test]
    fn from_bytes_validates_length() {
        assert!(MonoBitmap::from_bytes(10, 2, vec![0xFF; 4]).is_ok());
        assert!(MonoBitmap::from_bytes(10, 2, vec![0xFF; 3]).is_err());
    }
}
