use async_trait::async_trait;
use display64_hardware::{AsyncDevice, Error, Frame, Result};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::{
    io::{self, Cursor},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time;

/// A device that remembers every frame it was asked to draw.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    frames: Arc<Mutex<Vec<Frame>>>,
    failing: bool,
}

impl Recorder {
    /// A device whose link is always down.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    /// Waits until at least `count` frames arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<Frame> {
        time::timeout(Duration::from_secs(5), async {
            loop {
                let frames = self.frames();
                if frames.len() >= count {
                    return frames;
                }
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for frames")
    }
}

#[async_trait]
impl AsyncDevice for Recorder {
    async fn draw(&mut self, frame: &Frame) -> Result<()> {
        if self.failing {
            return Err(Error::Io {
                hostport: String::from("recorder"),
                source: io::ErrorKind::BrokenPipe.into(),
            });
        }
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// An encoded test image with a diagonal gradient.
pub fn encode(width: u32, height: u32, format: ImageOutputFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}
