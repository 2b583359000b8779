use crate::output::OutputChannel;
use anyhow::Context;
use chrono::{Local, NaiveTime, Timelike};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Supersampling factor for the analog face; rendered large, then scaled
/// down with Lanczos for smooth hands on a coarse matrix.
const SUPERSAMPLE: u32 = 4;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockKind {
    Digital,
    Analog,
}

impl Default for ClockKind {
    fn default() -> Self {
        ClockKind::Analog
    }
}

/// Time-of-day range gating when the clock draws. `start > end` wraps
/// midnight: active from `start` to 23:59:59 and from 00:00:00 to `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn parse(start: &str, end: &str) -> anyhow::Result<Self> {
        let start = NaiveTime::parse_from_str(start, "%H:%M")
            .with_context(|| format!("invalid clock window start '{start}' (want HH:MM)"))?;
        let end = NaiveTime::parse_from_str(end, "%H:%M")
            .with_context(|| format!("invalid clock window end '{end}' (want HH:MM)"))?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Background clock renderer.
///
/// `start`/`stop` are driven by the event dispatcher: the clock runs while no
/// track is playing. The worker polls a stop flag each iteration and `stop`
/// joins it before clearing the channel, so no late clock frame can land
/// behind whatever is shown next.
pub struct Clock {
    channel: OutputChannel,
    kind: ClockKind,
    window: TimeWindow,
    enabled: bool,
    worker: Mutex<Option<Worker>>,
}

impl Clock {
    pub fn new(channel: OutputChannel, kind: ClockKind, window: TimeWindow, enabled: bool) -> Self {
        Self {
            channel,
            kind,
            window,
            enabled,
            worker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().unwrap().is_some()
    }

    pub fn start(&self) {
        if !self.enabled {
            return;
        }
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            debug!("clock already running");
            return;
        }
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let channel = self.channel.clone();
        let kind = self.kind;
        let window = self.window;
        let handle = thread::spawn(move || run_loop(channel, kind, window, flag));
        *worker = Some(Worker { stop, handle });
    }

    /// Signal the worker and block until it has exited, then blank the
    /// channel. No-op when already stopped.
    pub fn stop(&self) {
        let mut worker = self.worker.lock().unwrap();
        if let Some(Worker { stop, handle }) = worker.take() {
            stop.store(true, Ordering::SeqCst);
            if handle.join().is_err() {
                warn!("clock worker panicked");
            }
            if let Err(e) = self.channel.clear() {
                warn!("failed to clear clock channel: {e}");
            }
        }
    }
}

fn run_loop(channel: OutputChannel, kind: ClockKind, window: TimeWindow, stop: Arc<AtomicBool>) {
    debug!("clock loop started");
    let mut previous = String::new();
    while !stop.load(Ordering::SeqCst) {
        let now = Local::now().time();
        let time_str = now.format("%H:%M:%S").to_string();
        // One frame per second is plenty; recheck shortly if the second
        // hasn't rolled over yet.
        if time_str == previous {
            thread::sleep(Duration::from_millis(200));
            continue;
        }
        previous = time_str.clone();

        if !window.contains(now) {
            if let Err(e) = channel.clear() {
                warn!("failed to blank clock outside its window: {e}");
            }
            thread::sleep(Duration::from_secs(1));
            continue;
        }

        let (width, height) = channel.size();
        let image = match kind {
            ClockKind::Digital => render_digital(&time_str, width, height),
            ClockKind::Analog => render_analog(now, width, height),
        };
        if let Err(e) = channel.show(&image) {
            warn!("clock frame not sent: {e}");
        }
    }
    debug!("clock loop stopped");
}

// 5x7 glyphs for the digital face, one u8 row per scanline, bit 4 leftmost.
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

fn glyph(c: char) -> Option<[u8; 7]> {
    Some(match c {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ':' => [0b00000, 0b00100, 0b00000, 0b00000, 0b00100, 0b00000, 0b00000],
        _ => return None,
    })
}

/// Render `time_str` (e.g. `"23:59:01"`) centered in white on a transparent
/// background, scaled up by whole pixels to fit the display.
pub fn render_digital(time_str: &str, width: u32, height: u32) -> RgbaImage {
    let mut image = RgbaImage::new(width, height);
    let chars: Vec<char> = time_str.chars().collect();
    if chars.is_empty() {
        return image;
    }

    let text_width = chars.len() as u32 * (GLYPH_WIDTH + 1) - 1;
    let scale = (width / text_width).min(height / GLYPH_HEIGHT).max(1);
    let x0 = (width.saturating_sub(text_width * scale)) / 2;
    let y0 = (height.saturating_sub(GLYPH_HEIGHT * scale)) / 2;

    for (i, c) in chars.iter().enumerate() {
        let Some(rows) = glyph(*c) else { continue };
        let cell_x = x0 + i as u32 * (GLYPH_WIDTH + 1) * scale;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = cell_x + col * scale + dx;
                        let y = y0 + row as u32 * scale + dy;
                        if x < width && y < height {
                            image.put_pixel(x, y, WHITE);
                        }
                    }
                }
            }
        }
    }
    image
}

/// Render an analog face for `time`: white rim, tick marks and three hands on
/// an opaque black dial.
pub fn render_analog(time: NaiveTime, width: u32, height: u32) -> RgbaImage {
    let scale = SUPERSAMPLE;
    let (sw, sh) = (width * scale, height * scale);
    let mut image = RgbaImage::from_pixel(sw, sh, Rgba([0, 0, 0, 255]));

    let cx = sw as f64 / 2.0;
    let cy = sh as f64 / 2.0;
    let radius = cx.min(cy) * 0.9;

    draw_ring(&mut image, cx, cy, radius, scale as f64 / 2.0);

    for i in 0..60 {
        let angle = (i as f64 / 60.0) * 2.0 * PI - PI / 2.0;
        let (inner_r, tick_w) = if i % 5 == 0 {
            (radius * 0.80, scale as f64)
        } else {
            (radius * 0.88, (scale as f64 / 3.0).max(1.0))
        };
        draw_line(
            &mut image,
            cx + inner_r * angle.cos(),
            cy + inner_r * angle.sin(),
            cx + radius * angle.cos(),
            cy + radius * angle.sin(),
            tick_w,
        );
    }

    let second = time.second() as f64;
    let minute = time.minute() as f64;
    let hour = (time.hour() % 12) as f64;

    let sec_angle = second / 60.0 * 2.0 * PI - PI / 2.0;
    let min_angle = (minute + second / 60.0) / 60.0 * 2.0 * PI - PI / 2.0;
    let hour_angle = (hour + minute / 60.0) / 12.0 * 2.0 * PI - PI / 2.0;

    let hands = [
        (hour_angle, radius * 0.55, scale as f64 * 2.0),
        (min_angle, radius * 0.75, scale as f64 * 1.5),
        (sec_angle, radius * 0.90, (scale as f64 * 0.6).max(1.0)),
    ];
    for (angle, length, hand_w) in hands {
        draw_line(
            &mut image,
            cx,
            cy,
            cx + length * angle.cos(),
            cy + length * angle.sin(),
            hand_w,
        );
    }

    stamp_disc(&mut image, cx, cy, scale as f64 * 1.5, WHITE);

    imageops::resize(&image, width, height, FilterType::Lanczos3)
}

fn stamp_disc(image: &mut RgbaImage, cx: f64, cy: f64, r: f64, color: Rgba<u8>) {
    let x0 = (cx - r).floor() as i64;
    let x1 = (cx + r).ceil() as i64;
    let y0 = (cy - r).floor() as i64;
    let y1 = (cy + r).ceil() as i64;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            if dx * dx + dy * dy <= r * r
                && x >= 0
                && y >= 0
                && (x as u32) < image.width()
                && (y as u32) < image.height()
            {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

fn draw_line(image: &mut RgbaImage, x0: f64, y0: f64, x1: f64, y1: f64, line_w: f64) {
    let length = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
    let steps = (length * 2.0).ceil().max(1.0) as u32;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        stamp_disc(
            image,
            x0 + (x1 - x0) * t,
            y0 + (y1 - y0) * t,
            (line_w / 2.0).max(0.5),
            WHITE,
        );
    }
}

fn draw_ring(image: &mut RgbaImage, cx: f64, cy: f64, radius: f64, half_w: f64) {
    let steps = (2.0 * PI * radius).ceil().max(8.0) as u32;
    for i in 0..steps {
        let angle = i as f64 / steps as f64 * 2.0 * PI;
        stamp_disc(
            image,
            cx + radius * angle.cos(),
            cy + radius * angle.sin(),
            half_w.max(0.5),
            WHITE,
        );
    }
}
