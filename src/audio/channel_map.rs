//! Maps the user's channel selection onto zero-based device channel indices.

/// User-facing channel selection: one mono channel or an ordered stereo pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelSelection {
    Mono(usize),
    Stereo(usize, usize),
}

impl ChannelSelection {
    /// Build a selection from the 1-based channel number shown to users.
    /// Stereo pairs the requested channel with its right-hand neighbour.
    pub fn from_config(first_channel: usize, stereo: bool) -> Self {
        let channel = first_channel.saturating_sub(1);
        if stereo {
            Self::Stereo(channel, channel + 1)
        } else {
            Self::Mono(channel)
        }
    }
}

/// Resolve a selection against the device's input channel count.
///
/// Indices beyond the device clamp to the highest valid channel, so a
/// hot-swap to a device with fewer inputs remaps instead of failing.
pub fn resolve_channel_map(selection: ChannelSelection, max_channels: usize) -> Vec<usize> {
    let clamp = |channel: usize| channel.min(max_channels.saturating_sub(1));
    match selection {
        ChannelSelection::Mono(channel) => vec![clamp(channel)],
        ChannelSelection::Stereo(left, right) => vec![clamp(left), clamp(right)],
    }
}
