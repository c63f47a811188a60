//! Destination buffers for encoded cell values.

use serde::Serialize;

use geo_common::{GridShape, Notification, NotificationLevel};

/// Sink the encoder writes cell values and notifications into.
pub trait Scanner {
    /// Write `value` at a row-major cell offset.
    fn set(&mut self, offset: usize, value: f64);

    /// Attach a non-fatal notification to the output.
    fn notify(&mut self, notification: Notification);
}

/// Values produced by one contextualization.
#[derive(Debug, Clone, Serialize)]
pub struct EncodedData {
    pub width: usize,
    pub height: usize,
    /// Row-major values, row 0 at the north edge.
    pub values: Vec<f64>,
    pub notifications: Vec<Notification>,
}

impl EncodedData {
    pub fn value(&self, col: usize, row: usize) -> f64 {
        self.values[row * self.width + col]
    }

    /// Number of cells that hold data.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.notifications
            .iter()
            .any(|n| n.level == NotificationLevel::Error)
    }
}

/// In-memory [`Scanner`] pre-filled with NaN.
#[derive(Debug, Clone)]
pub struct DataBuilder {
    shape: GridShape,
    values: Vec<f64>,
    notifications: Vec<Notification>,
}

impl DataBuilder {
    pub fn new(shape: GridShape) -> Self {
        Self {
            shape,
            values: vec![f64::NAN; shape.cell_count()],
            notifications: Vec::new(),
        }
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn build(self) -> EncodedData {
        EncodedData {
            width: self.shape.width,
            height: self.shape.height,
            values: self.values,
            notifications: self.notifications,
        }
    }
}

impl Scanner for DataBuilder {
    fn set(&mut self, offset: usize, value: f64) {
        if let Some(slot) = self.values.get_mut(offset) {
            *slot = value;
        }
    }

    fn notify(&mut self, notification: Notification) {
        notification.log();
        self.notifications.push(notification);
    }
}
