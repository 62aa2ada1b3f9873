//! Single-channel format with a reserved sentinel value.

use crate::error::{MapError, MapResult};

use super::{channel_mask, ChannelTuple, ColorValueFormat, Value};

/// One channel per cell; one value of the channel domain is reserved as
/// the empty sentinel and can never be stored.
#[derive(Debug, Clone)]
pub struct Monochrome {
    channel_width: u32,
    empty_value: u64,
    verify_channels: Option<u32>,
}

impl Monochrome {
    pub fn new(channel_width: u32, empty_value: u64) -> MapResult<Self> {
        if !(1..=64).contains(&channel_width) {
            return Err(MapError::FormatMismatch(format!(
                "channel width {channel_width} outside 1..=64"
            )));
        }
        if empty_value & !channel_mask(channel_width) != 0 {
            return Err(MapError::ValueOutOfRange {
                value: empty_value,
                bits: channel_width,
            });
        }
        Ok(Self {
            channel_width,
            empty_value,
            verify_channels: None,
        })
    }

    /// Makes `verify_medium` insist on an exact medium channel count.
    pub fn with_channel_verification(mut self, channels: u32) -> Self {
        self.verify_channels = Some(channels);
        self
    }

    pub fn empty_value(&self) -> u64 {
        self.empty_value
    }
}

impl ColorValueFormat for Monochrome {
    fn channel_count(&self) -> u32 {
        1
    }

    fn channel_width(&self) -> u32 {
        self.channel_width
    }

    fn encode(&self, value: Value) -> MapResult<ChannelTuple> {
        if value & !channel_mask(self.channel_width) != 0 || value == self.empty_value {
            return Err(MapError::ValueOutOfRange {
                value,
                bits: self.channel_width,
            });
        }
        Ok(vec![value])
    }

    fn decode(&self, tuple: &[u64]) -> MapResult<Option<Value>> {
        if tuple.len() != 1 {
            return Err(MapError::FormatMismatch(format!(
                "monochrome tuple has {} channels, expected 1",
                tuple.len()
            )));
        }
        if tuple[0] == self.empty_value {
            Ok(None)
        } else {
            Ok(Some(tuple[0]))
        }
    }

    fn empty_tuple(&self) -> ChannelTuple {
        vec![self.empty_value]
    }

    fn verify_medium(&self, medium_channels: u32) -> MapResult<()> {
        match self.verify_channels {
            Some(expected) if expected != medium_channels => {
                Err(MapError::FormatMismatch(format!(
                    "medium exposes {medium_channels} channels, expected {expected}"
                )))
            }
            _ => Ok(()),
        }
    }
}
