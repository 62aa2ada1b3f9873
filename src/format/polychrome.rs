//! Multi-channel format that stripes value bits across channels.

use crate::error::{MapError, MapResult};
use crate::reorder::ReversibleReorder;

use super::{channel_mask, value_as_bands, ChannelTuple, ColorValueFormat, Value};

/// Widest channel tuple any format may produce. With 64-bit values a tuple
/// can never carry more than 64 one-bit channels.
pub const MAX_PALETTE_WIDTH: u32 = 64;

/// Packs a value's bits as repeating `stripe_width`-bit stripes dealt
/// round-robin across the channels, most significant stripe first. The
/// all-ones tuple is reserved as the empty marker.
///
/// An optional channel reorder permutes the stored channel order, for media
/// whose channel layout differs from the striping order.
#[derive(Debug, Clone)]
pub struct Polychrome {
    channels: u32,
    channel_width: u32,
    stripe_width: u32,
    channel_reorder: Option<ReversibleReorder>,
}

impl Polychrome {
    pub fn new(channels: u32, channel_width: u32, stripe_width: u32) -> MapResult<Self> {
        if channels == 0 || channels > MAX_PALETTE_WIDTH {
            return Err(MapError::FormatMismatch(format!(
                "channel count {channels} outside 1..={MAX_PALETTE_WIDTH}"
            )));
        }
        if !(1..=64).contains(&channel_width) {
            return Err(MapError::FormatMismatch(format!(
                "channel width {channel_width} outside 1..=64"
            )));
        }
        match channels.checked_mul(channel_width) {
            Some(total) if total <= 64 => {}
            _ => {
                return Err(MapError::FormatMismatch(format!(
                    "{channels} channels of {channel_width} bits exceed a 64-bit value"
                )))
            }
        }
        if stripe_width == 0 || channel_width % stripe_width != 0 {
            return Err(MapError::FormatMismatch(format!(
                "stripe width {stripe_width} does not divide channel width {channel_width}"
            )));
        }
        Ok(Self {
            channels,
            channel_width,
            stripe_width,
            channel_reorder: None,
        })
    }

    /// Stores channels permuted by `reorder`; decode applies the forward
    /// table to recover striping order.
    pub fn with_channel_reorder(mut self, reorder: ReversibleReorder) -> MapResult<Self> {
        if reorder.domain_len() != self.channels as usize {
            return Err(MapError::IncompleteMapping(format!(
                "channel reorder covers {} of {} channels",
                reorder.domain_len(),
                self.channels
            )));
        }
        self.channel_reorder = Some(reorder);
        Ok(self)
    }

    pub fn stripe_width(&self) -> u32 {
        self.stripe_width
    }

    fn total_bits(&self) -> u32 {
        self.channels * self.channel_width
    }

    fn stripe(&self, value: u64) -> ChannelTuple {
        let num_stripes = self.total_bits() / self.stripe_width;
        let mut tuple = vec![0u64; self.channels as usize];
        for (i, stripe) in value_as_bands(value, num_stripes, self.stripe_width)
            .into_iter()
            .enumerate()
        {
            let channel = i % self.channels as usize;
            tuple[channel] = (tuple[channel] << self.stripe_width) | stripe;
        }
        tuple
    }

    fn unstripe(&self, tuple: &[u64]) -> u64 {
        let num_stripes = (self.total_bits() / self.stripe_width) as usize;
        let per_channel = (self.channel_width / self.stripe_width) as u32;
        let bands: Vec<Vec<u64>> = tuple
            .iter()
            .map(|&channel| value_as_bands(channel, per_channel, self.stripe_width))
            .collect();
        let mut value = 0u64;
        for i in 0..num_stripes {
            let channel = i % self.channels as usize;
            let position = i / self.channels as usize;
            value = (value << self.stripe_width) | bands[channel][position];
        }
        value
    }
}

impl ColorValueFormat for Polychrome {
    fn channel_count(&self) -> u32 {
        self.channels
    }

    fn channel_width(&self) -> u32 {
        self.channel_width
    }

    fn encode(&self, value: Value) -> MapResult<ChannelTuple> {
        // The all-ones value stripes to the reserved empty tuple.
        if value >= channel_mask(self.total_bits()) {
            return Err(MapError::ValueOutOfRange {
                value,
                bits: self.total_bits(),
            });
        }
        let tuple = self.stripe(value);
        Ok(match &self.channel_reorder {
            Some(reorder) => reorder.apply_inverse(&tuple),
            None => tuple,
        })
    }

    fn decode(&self, tuple: &[u64]) -> MapResult<Option<Value>> {
        if tuple.len() != self.channels as usize {
            return Err(MapError::FormatMismatch(format!(
                "polychrome tuple has {} channels, expected {}",
                tuple.len(),
                self.channels
            )));
        }
        let mask = channel_mask(self.channel_width);
        if let Some(&wide) = tuple.iter().find(|&&c| c & !mask != 0) {
            return Err(MapError::ValueOutOfRange {
                value: wide,
                bits: self.channel_width,
            });
        }
        if self.is_empty_marker(tuple) {
            return Ok(None);
        }
        let striped = match &self.channel_reorder {
            Some(reorder) => reorder.apply(tuple),
            None => tuple.to_vec(),
        };
        Ok(Some(self.unstripe(&striped)))
    }

    fn empty_tuple(&self) -> ChannelTuple {
        vec![channel_mask(self.channel_width); self.channels as usize]
    }
}
