use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub(crate) const FRAME_QUEUE_CAPACITY: usize = 8;
pub(crate) const LOOT_QUEUE_CAPACITY: usize = 2;

/// Number of palette entries a captured frame may index into.
pub const FRAME_PALETTE_SIZE: u8 = 2;

/// A thresholded screen capture: one palette index per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalettedFrame {
    width: u16,
    height: u16,
    pixels: Vec<u8>,
}

impl PalettedFrame {
    pub fn new(width: u16, height: u16, pixels: Vec<u8>) -> Result<Self, String> {
        let expected_len = usize::from(width) * usize::from(height);
        if pixels.len() != expected_len {
            return Err(format!(
                "Frame of {width}x{height} needs {expected_len} pixels, got {}",
                pixels.len()
            ));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Builds a frame from a row-major luminance buffer, mapping every
    /// pixel at or above `threshold` to palette index 1.
    pub fn from_luma(
        width: u16,
        height: u16,
        luma: &[u8],
        threshold: u8,
    ) -> Result<Self, String> {
        let pixels = luma
            .iter()
            .map(|value| u8::from(*value >= threshold))
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Producer side of the frame queue, handed to the screen-capture ticker.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<PalettedFrame>,
}

impl FrameSender {
    /// Queues a frame without blocking. Returns `false` when the frame was
    /// dropped because the queue is full or the recorder is gone.
    pub fn submit(&self, frame: PalettedFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Frame queue full, dropping captured frame");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Frame queue closed, dropping captured frame");
                false
            }
        }
    }
}

/// Producer side of the loot queue, handed to the clipboard-change listener.
#[derive(Clone)]
pub struct LootSender {
    tx: mpsc::Sender<String>,
}

impl LootSender {
    /// Queues a clipboard snapshot without blocking. Any text is accepted.
    pub fn submit(&self, clipboard_text: impl Into<String>) -> bool {
        match self.tx.try_send(clipboard_text.into()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Loot queue full, clipboard capture dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("Loot queue closed, clipboard capture dropped");
                false
            }
        }
    }
}

pub(crate) struct CaptureReceivers {
    pub(crate) frames: mpsc::Receiver<PalettedFrame>,
    pub(crate) loot: mpsc::Receiver<String>,
}

pub(crate) fn capture_channels(
    frame_capacity: usize,
    loot_capacity: usize,
) -> (FrameSender, LootSender, CaptureReceivers) {
    let (frame_tx, frame_rx) = mpsc::channel(frame_capacity.max(1));
    let (loot_tx, loot_rx) = mpsc::channel(loot_capacity.max(1));

    (
        FrameSender { tx: frame_tx },
        LootSender { tx: loot_tx },
        CaptureReceivers {
            frames: frame_rx,
            loot: loot_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::{capture_channels, PalettedFrame};

    #[test]
    fn rejects_pixel_buffer_with_wrong_length() {
        let result = PalettedFrame::new(4, 4, vec![0; 15]);
        assert!(result.is_err(), "A 4x4 frame must carry exactly 16 pixels");
    }

    #[test]
    fn thresholds_luma_into_two_palette_indices() {
        let frame = PalettedFrame::from_luma(2, 2, &[0, 109, 110, 255], 110)
            .expect("Expected luma frame to build");
        assert_eq!(frame.pixels(), &[0, 0, 1, 1]);
    }

    #[test]
    fn drops_newest_item_when_queue_is_full() {
        let (frames, loot, mut receivers) = capture_channels(2, 1);

        assert!(loot.submit("first"));
        assert!(!loot.submit("second"), "Second loot item should be dropped");
        assert_eq!(receivers.loot.try_recv().ok().as_deref(), Some("first"));
        assert!(receivers.loot.try_recv().is_err());

        let frame = PalettedFrame::new(1, 1, vec![1]).expect("Expected frame to build");
        assert!(frames.submit(frame.clone()));
        assert!(frames.submit(frame.clone()));
        assert!(!frames.submit(frame), "Third frame should not block and be dropped");
        assert!(receivers.frames.try_recv().is_ok());
        assert!(receivers.frames.try_recv().is_ok());
        assert!(receivers.frames.try_recv().is_err());
    }

    #[test]
    fn reports_drop_after_receiver_is_gone() {
        let (_frames, loot, receivers) = capture_channels(1, 1);
        drop(receivers);
        assert!(!loot.submit("orphaned"));
    }
}
