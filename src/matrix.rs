use image::RgbaImage;
use std::net::UdpSocket;
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("display endpoint unreachable: {0}")]
    Transport(#[from] std::io::Error),
}

/// Shared UDP frame sink for a flaschen-taschen display.
///
/// Each call to [`Matrix::transmit`] sends one full frame as a single
/// datagram: a binary PPM (`P6`) header, `width * height * 3` RGB bytes and a
/// footer selecting the server-side compositing layer. The sink also owns the
/// in-process priority gate: once a source has shown a frame, sources with a
/// numerically greater (lower-precedence) priority are dropped until someone
/// clears the display.
pub struct Matrix {
    width: u32,
    height: u32,
    transparent: bool,
    header_len: usize,
    state: Mutex<SinkState>,
}

struct SinkState {
    sock: UdpSocket,
    frame: Vec<u8>,
    last_priority: Option<u8>,
}

impl Matrix {
    pub fn connect(
        host: &str,
        port: u16,
        width: u32,
        height: u32,
        layer: u32,
        transparent: bool,
    ) -> Result<Self, MatrixError> {
        let sock = UdpSocket::bind(("0.0.0.0", 0))?;
        sock.connect((host, port))?;

        let header = format!("P6\n{width} {height}\n255\n");
        let footer = format!("0\n0\n{layer}\n");
        let pixels = width as usize * height as usize * 3;
        let mut frame = vec![0u8; header.len() + pixels + footer.len()];
        frame[..header.len()].copy_from_slice(header.as_bytes());
        let footer_at = header.len() + pixels;
        frame[footer_at..].copy_from_slice(footer.as_bytes());

        Ok(Self {
            width,
            height,
            transparent,
            header_len: header.len(),
            state: Mutex::new(SinkState {
                sock,
                frame,
                last_priority: None,
            }),
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Set a single pixel in the frame buffer without transmitting.
    /// Out-of-range coordinates are ignored.
    pub fn set(&self, x: i64, y: i64, color: [u8; 3]) {
        let mut state = self.state.lock().unwrap();
        self.paint(&mut state.frame, x, y, color);
    }

    /// Transmit the current frame buffer as-is, bypassing the priority gate.
    pub fn send(&self) -> Result<(), MatrixError> {
        let state = self.state.lock().unwrap();
        state.sock.send(&state.frame)?;
        Ok(())
    }

    /// Paint `image` into the frame buffer and transmit it on behalf of a
    /// source with the given priority.
    ///
    /// Non-clear frames from a lower-precedence source (numerically greater
    /// priority) than the last one shown are silently dropped. A clear frame
    /// always goes out and releases the gate.
    pub fn transmit(
        &self,
        image: &RgbaImage,
        priority: u8,
        clear: bool,
    ) -> Result<(), MatrixError> {
        let mut state = self.state.lock().unwrap();

        if !clear {
            if let Some(last) = state.last_priority {
                if priority > last {
                    debug!("frame at priority {priority} gated behind priority {last}");
                    return Ok(());
                }
            }
        }
        state.last_priority = if clear { None } else { Some(priority) };

        for (x, y, pixel) in image.enumerate_pixels() {
            // Alpha is dropped; the wire format is plain RGB.
            let [r, g, b, _] = pixel.0;
            self.paint(&mut state.frame, x as i64, y as i64, [r, g, b]);
        }
        state.sock.send(&state.frame)?;
        Ok(())
    }

    fn paint(&self, frame: &mut [u8], x: i64, y: i64, mut color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        // The server treats black as "show the layer below". Nudge true black
        // so opaque content stays opaque unless transparency is wanted.
        if color == [0, 0, 0] && !self.transparent {
            color = [1, 1, 1];
        }
        let offset = self.header_len + (y as usize * self.width as usize + x as usize) * 3;
        frame[offset..offset + 3].copy_from_slice(&color);
    }
}
