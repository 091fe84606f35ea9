use crate::{Error, Result};
use async_trait::async_trait;
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder, ImageFormat, Rgba, RgbaImage};

pub const DISPLAY_WIDTH: u32 = 64;
pub const DISPLAY_HEIGHT: u32 = 64;

/// A single PNG encoded image sized for the LED matrix.
///
/// The matrix only understands `DISPLAY_WIDTH` x `DISPLAY_HEIGHT` images so
/// `Frame::encode` refuses anything else. Frames received from the wire via
/// `Frame::from_png` are taken as they come; `Frame::decode` is the place to
/// validate them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    png: Vec<u8>,
}

impl Frame {
    /// Encodes a matrix sized image as PNG.
    pub fn encode(image: &RgbaImage) -> Result<Self> {
        if image.dimensions() != (DISPLAY_WIDTH, DISPLAY_HEIGHT) {
            return Err(Error::Dimensions {
                width: image.width(),
                height: image.height(),
                expected_width: DISPLAY_WIDTH,
                expected_height: DISPLAY_HEIGHT,
            });
        }

        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)
            .map_err(Error::Encode)?;

        Ok(Self { png })
    }

    /// A frame where every pixel has the same color.
    pub fn filled(color: Rgba<u8>) -> Result<Self> {
        Self::encode(&RgbaImage::from_pixel(DISPLAY_WIDTH, DISPLAY_HEIGHT, color))
    }

    /// An all black frame, used to clear the matrix.
    pub fn blank() -> Result<Self> {
        Self::filled(Rgba([0, 0, 0, 255]))
    }

    pub fn from_png(png: Vec<u8>) -> Self {
        Self { png }
    }

    pub fn decode(&self) -> image::ImageResult<RgbaImage> {
        Ok(image::load_from_memory_with_format(&self.png, ImageFormat::Png)?.into_rgba8())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn len(&self) -> usize {
        self.png.len()
    }

    pub fn is_empty(&self) -> bool {
        self.png.is_empty()
    }

    /// The length prefix that precedes the PNG bytes on the wire.
    pub fn header(&self) -> [u8; 8] {
        (self.png.len() as u64).to_be_bytes()
    }
}

/// This trait represents a device that can receive new images to be displayed.
#[async_trait]
pub trait AsyncDevice: Send {
    /// Sends a `Frame` to the device.
    async fn draw(&mut self, frame: &Frame) -> Result<()>;
    /// Convenience method for clearing the whole screen.
    /// Most implementations will send a blank `Frame` to `AsyncDevice::draw`.
    async fn clear(&mut self) -> Result<()> {
        let frame = Frame::blank()?;
        self.draw(&frame).await
    }

    async fn shutdown(&mut self) -> Result<()>;
}

#[async_trait]
impl<D: AsyncDevice + ?Sized> AsyncDevice for Box<D> {
    async fn draw(&mut self, frame: &Frame) -> Result<()> {
        (**self).draw(frame).await
    }

    async fn clear(&mut self) -> Result<()> {
        (**self).clear().await
    }

    async fn shutdown(&mut self) -> Result<()> {
        (**self).shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_rejects_wrong_size() {
        let image = RgbaImage::new(32, 64);
        let err = Frame::encode(&image).unwrap_err();
        assert!(matches!(
            err,
            Error::Dimensions {
                width: 32,
                height: 64,
                ..
            }
        ));
    }

    #[test]
    fn filled_frame_decodes_to_matrix_size() {
        let frame = Frame::filled(Rgba([255, 0, 0, 255])).unwrap();
        assert_eq!(&frame.as_bytes()[1..4], b"PNG");

        let image = frame.decode().unwrap();
        assert_eq!(image.dimensions(), (DISPLAY_WIDTH, DISPLAY_HEIGHT));
        assert_eq!(image.get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn header_is_big_endian_length() {
        let frame = Frame::from_png(vec![0; 0x0102]);
        assert_eq!(frame.header(), [0, 0, 0, 0, 0, 0, 0x01, 0x02]);
    }
}
