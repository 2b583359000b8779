use crate::matrix::{Matrix, MatrixError};
use image::RgbaImage;
use std::sync::Arc;

/// A content source's handle on the shared display.
///
/// The channel carries no state of its own beyond the priority fixed at
/// construction, so it can be cloned into background workers freely; all
/// arbitration lives in [`Matrix`].
#[derive(Clone)]
pub struct OutputChannel {
    matrix: Arc<Matrix>,
    priority: u8,
}

impl OutputChannel {
    pub fn new(matrix: Arc<Matrix>, priority: u8) -> Self {
        Self { matrix, priority }
    }

    pub fn size(&self) -> (u32, u32) {
        self.matrix.size()
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn show(&self, image: &RgbaImage) -> Result<(), MatrixError> {
        self.matrix.transmit(image, self.priority, false)
    }

    /// Send a blank frame and release the priority gate.
    pub fn clear(&self) -> Result<(), MatrixError> {
        let (width, height) = self.matrix.size();
        self.matrix
            .transmit(&RgbaImage::new(width, height), self.priority, true)
    }
}
