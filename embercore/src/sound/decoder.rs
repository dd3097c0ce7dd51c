//! Streaming PCM decode contract. A real OGG source pulls encoded data from
//! the resource's ring buffer and decodes block-by-block; tests supply a
//! deterministic synthetic decoder instead.

/// Result of filling one playback block.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DecodeOutcome {
    /// `out` was filled with decoded samples.
    Filled,
    /// The stream ran out of encoded data before filling `out`.
    Eof,
}

/// Pulls f32 PCM out of a streaming sound resource. `fill_block` is called up
/// to [`super::SOUND_MAX_BUFFERS`] times per frame by [`super::SoundWorld::update`].
pub trait StreamDecoder: Send {
    /// Decodes the next block into `out`, returning whether it was fully
    /// filled or the stream hit EOF first (a partially filled tail is
    /// discarded rather than uploaded).
    fn fill_block(&mut self, out: &mut [f32]) -> DecodeOutcome;

    /// Seeks back to just after the codec headers region, used to loop a
    /// stream that hit EOF with `loop` enabled.
    fn rewind_to_stream_start(&mut self);
}

/// Deterministic decoder for tests: emits a fixed number of silent blocks,
/// then EOF.
pub struct SilentTestDecoder {
    blocks_remaining: u32,
    total_blocks: u32,
}

impl SilentTestDecoder {
    pub fn new(total_blocks: u32) -> Self {
        SilentTestDecoder {
            blocks_remaining: total_blocks,
            total_blocks,
        }
    }
}

impl StreamDecoder for SilentTestDecoder {
    fn fill_block(&mut self, out: &mut [f32]) -> DecodeOutcome {
        if self.blocks_remaining == 0 {
            return DecodeOutcome::Eof;
        }
        out.fill(0.0);
        self.blocks_remaining -= 1;
        DecodeOutcome::Filled
    }

    fn rewind_to_stream_start(&mut self) {
        self.blocks_remaining = self.total_blocks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_decoder_reaches_eof_then_rewinds() {
        let mut decoder = SilentTestDecoder::new(2);
        let mut buf = [1.0; 8];
        assert_eq!(decoder.fill_block(&mut buf), DecodeOutcome::Filled);
        assert_eq!(decoder.fill_block(&mut buf), DecodeOutcome::Filled);
        assert_eq!(decoder.fill_block(&mut buf), DecodeOutcome::Eof);
        decoder.rewind_to_stream_start();
        assert_eq!(decoder.fill_block(&mut buf), DecodeOutcome::Filled);
    }
}
