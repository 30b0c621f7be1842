use std::borrow::Cow;

use super::EncodingError;
use crate::capture::{PalettedFrame, FRAME_PALETTE_SIZE};

/// Black for index 0, white for index 1.
pub(crate) const OVERVIEW_PALETTE: [u8; 6] = [0x00, 0x00, 0x00, 0xff, 0xff, 0xff];

/// Packs the captured frames into a single animated GIF. `delays` are in
/// centiseconds and must line up with `frames`. The first frame sets the
/// canvas; later frames may be smaller and are drawn at its top-left corner,
/// but never larger. The animation plays once.
pub fn encode_overview(frames: &[PalettedFrame], delays: &[u16]) -> Result<Vec<u8>, EncodingError> {
    let first_frame = frames.first().ok_or(EncodingError::EmptyAnimation)?;
    if frames.len() != delays.len() {
        return Err(EncodingError::DelayCountMismatch {
            frames: frames.len(),
            delays: delays.len(),
        });
    }

    let screen_width = first_frame.width();
    let screen_height = first_frame.height();
    let mut buffer = Vec::new();
    let mut encoder =
        gif::Encoder::new(&mut buffer, screen_width, screen_height, &OVERVIEW_PALETTE)?;

    for (index, (frame, delay)) in frames.iter().zip(delays).enumerate() {
        if frame.width() > screen_width || frame.height() > screen_height {
            return Err(EncodingError::FrameSizeMismatch {
                index,
                expected_width: screen_width,
                expected_height: screen_height,
                width: frame.width(),
                height: frame.height(),
            });
        }

        if let Some(value) = frame
            .pixels()
            .iter()
            .copied()
            .find(|value| *value >= FRAME_PALETTE_SIZE)
        {
            return Err(EncodingError::PaletteIndexOutOfRange { index, value });
        }

        let gif_frame = gif::Frame {
            width: frame.width(),
            height: frame.height(),
            delay: *delay,
            buffer: Cow::Borrowed(frame.pixels()),
            ..gif::Frame::default()
        };
        encoder.write_frame(&gif_frame)?;
    }

    encoder.into_inner()?;
    Ok(buffer)
}
