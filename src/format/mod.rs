//! Value codecs: how a logical value is laid out across channel tuples.

pub mod monochrome;
pub mod polychrome;

pub use monochrome::Monochrome;
pub use polychrome::{Polychrome, MAX_PALETTE_WIDTH};

use crate::error::MapResult;

/// A logical value in a format's domain.
pub type Value = u64;

/// One cell's channel contents, `channel_count()` words of
/// `channel_width()` bits each.
pub type ChannelTuple = Vec<u64>;

/// Bidirectional codec between values and channel tuples.
///
/// Formats are immutable configuration objects; they perform no I/O and
/// hold no per-map state, so one instance can serve any number of maps.
pub trait ColorValueFormat: Send + Sync + std::fmt::Debug {
    fn channel_count(&self) -> u32;

    /// Width in bits of each channel word.
    fn channel_width(&self) -> u32;

    /// Encodes a value into a channel tuple. Fails with `ValueOutOfRange`
    /// when the value does not fit the format's domain or collides with
    /// the reserved empty marker.
    fn encode(&self, value: Value) -> MapResult<ChannelTuple>;

    /// Decodes a channel tuple. `Ok(None)` is the empty marker: the cell
    /// holds no value.
    fn decode(&self, tuple: &[u64]) -> MapResult<Option<Value>>;

    /// The tuple representing "no value here".
    fn empty_tuple(&self) -> ChannelTuple;

    fn is_empty_marker(&self, tuple: &[u64]) -> bool {
        tuple == self.empty_tuple().as_slice()
    }

    /// Checks the format against the backing medium's channel count.
    /// The default accepts any medium.
    fn verify_medium(&self, medium_channels: u32) -> MapResult<()> {
        let _ = medium_channels;
        Ok(())
    }
}

/// Mask covering the low `width` bits, saturating at the full word.
pub(crate) fn channel_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Splits `value` into `count` bands of `band_width` bits each, most
/// significant band first. Callers keep `count * band_width <= 64`.
pub(crate) fn value_as_bands(value: u64, count: u32, band_width: u32) -> Vec<u64> {
    let mask = channel_mask(band_width);
    (0..count)
        .map(|i| (value >> (band_width * (count - 1 - i))) & mask)
        .collect()
}
