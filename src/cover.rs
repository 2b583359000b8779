use crate::output::OutputChannel;
use anyhow::Context;
use image::{imageops, RgbaImage};
use tracing::debug;

/// Now-playing cover art source.
pub struct CoverArt {
    channel: OutputChannel,
}

impl CoverArt {
    pub fn new(channel: OutputChannel) -> Self {
        Self { channel }
    }

    /// Decode `payload`, thumbnail it to fit the display while keeping its
    /// aspect ratio and show it centered on a blank canvas.
    pub fn show_cover(&self, payload: &[u8]) -> anyhow::Result<()> {
        let decoded = image::load_from_memory(payload).context("decoding cover art payload")?;
        debug!(
            "cover art {}x{}, {} bytes",
            decoded.width(),
            decoded.height(),
            payload.len()
        );

        let (width, height) = self.channel.size();
        let thumb = decoded.thumbnail(width, height).to_rgba8();
        let mut canvas = RgbaImage::new(width, height);
        let x = (width.saturating_sub(thumb.width())) / 2;
        let y = (height.saturating_sub(thumb.height())) / 2;
        imageops::overlay(&mut canvas, &thumb, x as i64, y as i64);

        self.channel.show(&canvas)?;
        Ok(())
    }

    /// Blank the display when the play session ends.
    pub fn end_session(&self) -> anyhow::Result<()> {
        self.channel.clear()?;
        Ok(())
    }
}
