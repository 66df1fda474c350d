/// One message from a parsed score, stamped with its absolute playback time.
///
/// `message` holds the raw encoding as it appeared in the file, status byte
/// first: channel messages are `[status, data..]`, meta events
/// `[0xFF, type, len.., data..]` and sysex `[0xF0 | 0xF7, len.., data..]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub time_seconds: f64,
    pub tick: u64,
    pub track: u16,
    pub message: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOff { channel: u8, pitch: u8, velocity: u8 },
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    PolyPressure { channel: u8, pitch: u8, pressure: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    PitchBend { channel: u8, value: u16 },
}

impl ChannelMessage {
    /// Decodes a channel voice message. Anything else (meta, sysex, short
    /// buffers) yields `None`.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let channel = status & 0x0F;
        let byte = |i: usize| data.get(i).copied();

        let msg = match status & 0xF0 {
            0x80 => ChannelMessage::NoteOff {
                channel,
                pitch: byte(0)?,
                velocity: byte(1)?,
            },
            0x90 => ChannelMessage::NoteOn {
                channel,
                pitch: byte(0)?,
                velocity: byte(1)?,
            },
            0xA0 => ChannelMessage::PolyPressure {
                channel,
                pitch: byte(0)?,
                pressure: byte(1)?,
            },
            0xB0 => ChannelMessage::ControlChange {
                channel,
                controller: byte(0)?,
                value: byte(1)?,
            },
            0xC0 => ChannelMessage::ProgramChange {
                channel,
                program: byte(0)?,
            },
            0xD0 => ChannelMessage::ChannelPressure {
                channel,
                pressure: byte(0)?,
            },
            0xE0 => ChannelMessage::PitchBend {
                channel,
                value: ((byte(1)? as u16) << 7) | (byte(0)? as u16),
            },
            _ => return None,
        };
        Some(msg)
    }
}

/// A short message that fits in a ring buffer slot without allocating.
/// Used for live input, where messages never exceed three bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage {
    bytes: [u8; 3],
    len: u8,
}

impl RawMessage {
    pub fn new(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > 3 {
            return None;
        }
        let mut buf = [0u8; 3];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            bytes: buf,
            len: bytes.len() as u8,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}
