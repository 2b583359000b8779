use crate::output::OutputChannel;
use image::{Rgba, RgbaImage};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

const BORDER: Rgba<u8> = Rgba([40, 40, 40, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("volume payload is not ASCII text")]
    NotText,
    #[error("expected at least 4 comma-separated fields, got {0}")]
    FieldCount(usize),
    #[error("non-numeric volume field '{0}'")]
    Parse(String),
    #[error("volume range is empty (min == max)")]
    EmptyRange,
}

/// One `idx,current,min,max` update as published by the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeUpdate {
    pub index: f64,
    pub current: f64,
    pub min: f64,
    pub max: f64,
}

pub fn parse_volume_payload(payload: &[u8]) -> Result<VolumeUpdate, VolumeError> {
    let text = std::str::from_utf8(payload).map_err(|_| VolumeError::NotText)?;
    let fields = text
        .split(',')
        .map(|field| {
            let field = field.trim();
            field
                .parse::<f64>()
                .map_err(|_| VolumeError::Parse(field.to_string()))
        })
        .collect::<Result<Vec<f64>, VolumeError>>()?;
    if fields.len() < 4 {
        return Err(VolumeError::FieldCount(fields.len()));
    }
    Ok(VolumeUpdate {
        index: fields[0],
        current: fields[1],
        min: fields[2],
        max: fields[3],
    })
}

/// Linearly rescale `value` from `[old_min, old_max]` to `[new_min, new_max]`.
pub fn rescale(
    value: f64,
    old_min: f64,
    old_max: f64,
    new_min: f64,
    new_max: f64,
) -> Result<f64, VolumeError> {
    if old_max == old_min {
        return Err(VolumeError::EmptyRange);
    }
    Ok(new_min + (value - old_min) * (new_max - new_min) / (old_max - old_min))
}

/// Render a vertical level bar along the right edge of the display.
///
/// `level` is in pixels, already rescaled to `[0, height]`. Full rows are
/// white inside a dim outline; a fractional top row fades in proportionally.
pub fn render_bar(level: f64, width: u32, height: u32, bar_width: u32) -> RgbaImage {
    let mut image = RgbaImage::new(width, height);
    let level = level.clamp(0.0, height as f64);
    if level <= 0.0 {
        return image;
    }

    let full = level.floor() as i64;
    let frac = level - level.floor();

    let x1 = width as i64 - bar_width as i64;
    let x2 = width as i64 - 1;
    let bottom = height as i64 - 1;
    let mut top = height as i64 - full;
    if frac > 0.0 {
        top -= 1;
    }

    outline_rect(&mut image, x1, top, x2, bottom, BORDER);
    for i in 0..full {
        fill_row(&mut image, x1 + 1, x2 - 1, bottom - i, WHITE);
    }
    if frac > 0.0 && full < height as i64 {
        let brightness = (255.0 * frac) as u8;
        fill_row(
            &mut image,
            x1 + 1,
            x2 - 1,
            bottom - full,
            Rgba([brightness, brightness, brightness, 255]),
        );
    }
    image
}

fn put_px(image: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_row(image: &mut RgbaImage, x1: i64, x2: i64, y: i64, color: Rgba<u8>) {
    for x in x1..=x2 {
        put_px(image, x, y, color);
    }
}

fn outline_rect(image: &mut RgbaImage, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgba<u8>) {
    for x in x1..=x2 {
        put_px(image, x, y1, color);
        put_px(image, x, y2, color);
    }
    for y in y1..=y2 {
        put_px(image, x1, y, color);
        put_px(image, x2, y, color);
    }
}

/// Transient volume bar with a cancellable auto-revert timer.
///
/// Every [`trigger`](VolumeOverlay::trigger) shows the new image, cancels any
/// pending revert and arms a fresh one, all under one lock, so rapid updates
/// never leave two countdowns alive. The revert clears the channel `timeout`
/// after the *last* trigger.
pub struct VolumeOverlay {
    channel: OutputChannel,
    timeout: Duration,
    bar_width: u32,
    // Generation counter plus condvar; bumping the counter cancels the
    // revert thread that was armed for the previous value.
    revert: Arc<(Mutex<u64>, Condvar)>,
}

impl VolumeOverlay {
    pub fn new(channel: OutputChannel, timeout: Duration, bar_width: u32) -> Self {
        Self {
            channel,
            timeout,
            bar_width,
            revert: Arc::new((Mutex::new(0), Condvar::new())),
        }
    }

    /// Parse a raw broker payload, rescale it to the display height and show
    /// the bar. Malformed payloads are dropped without touching the display.
    pub fn update(&self, payload: &[u8]) -> Result<(), VolumeError> {
        let update = parse_volume_payload(payload)?;
        let (width, height) = self.channel.size();
        let level = rescale(update.current, update.min, update.max, 0.0, height as f64)?;
        self.trigger(render_bar(level, width, height, self.bar_width));
        Ok(())
    }

    /// Show `image` and restart the auto-revert countdown.
    pub fn trigger(&self, image: RgbaImage) {
        let (lock, cvar) = &*self.revert;
        let mut generation = lock.lock().unwrap();
        *generation += 1;
        let armed = *generation;
        cvar.notify_all();

        if let Err(e) = self.channel.show(&image) {
            warn!("volume frame not sent: {e}");
        }

        let revert = Arc::clone(&self.revert);
        let channel = self.channel.clone();
        let timeout = self.timeout;
        thread::spawn(move || {
            let (lock, cvar) = &*revert;
            let deadline = Instant::now() + timeout;
            let mut generation = lock.lock().unwrap();
            loop {
                if *generation != armed {
                    // Superseded by a newer trigger; its revert takes over.
                    return;
                }
                let now = Instant::now();
                if now >= deadline {
                    // Still the latest trigger: revert under the lock so a
                    // concurrent trigger cannot slip in between.
                    if let Err(e) = channel.clear() {
                        warn!("volume overlay revert failed: {e}");
                    }
                    return;
                }
                let (guard, _) = cvar.wait_timeout(generation, deadline - now).unwrap();
                generation = guard;
            }
        });
    }
}
