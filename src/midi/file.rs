//! Standard MIDI File decoding.
//!
//! Produces a flat, time-sorted list of [`TimedEvent`]s. Tick positions are
//! converted to seconds through a tempo map, so a tempo change only affects
//! the ticks that follow it.

use std::fmt;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::FormatError;
use crate::events::TimedEvent;

const HEADER_MAGIC: &[u8; 4] = b"MThd";
const TRACK_MAGIC: &[u8; 4] = b"MTrk";

const META: u8 = 0xFF;
const META_SET_TEMPO: u8 = 0x51;
const META_END_OF_TRACK: u8 = 0x2F;
const SYSEX_START: u8 = 0xF0;
const SYSEX_ESCAPE: u8 = 0xF7;

/// 120 BPM.
pub const DEFAULT_TEMPO: u32 = 500_000;
const MAX_VLQ_BYTES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Division {
    TicksPerQuarter(u16),
    Smpte {
        frames_per_second: f64,
        ticks_per_frame: u8,
    },
}

impl Division {
    fn from_raw(raw: u16) -> Result<Self, FormatError> {
        if raw & 0x8000 != 0 {
            // High byte is the negated frame rate in two's complement.
            let fps = -(((raw >> 8) as u8 as i8) as i32);
            let frames_per_second = if fps == 29 { 29.97 } else { fps as f64 };
            let ticks_per_frame = (raw & 0xFF) as u8;
            if ticks_per_frame == 0 || fps <= 0 {
                return Err(FormatError::ZeroDivision);
            }
            warn!(
                frames_per_second,
                ticks_per_frame, "SMPTE time division, timing will be approximate"
            );
            Ok(Division::Smpte {
                frames_per_second,
                ticks_per_frame,
            })
        } else if raw == 0 {
            Err(FormatError::ZeroDivision)
        } else {
            Ok(Division::TicksPerQuarter(raw))
        }
    }

    /// For SMPTE files this is only an approximation (fps × ticks per frame).
    pub fn ticks_per_quarter(&self) -> f64 {
        match *self {
            Division::TicksPerQuarter(tpq) => tpq as f64,
            Division::Smpte {
                frames_per_second,
                ticks_per_frame,
            } => frames_per_second * ticks_per_frame as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreHeader {
    pub format: u16,
    pub tracks: u16,
    pub division: Division,
}

/// An event the parser recognised as present but could not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub track: usize,
    pub offset: usize,
    pub status: u8,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "track {}: unsupported status byte {:#04x} at offset {}, skipped",
            self.track, self.status, self.offset
        )
    }
}

#[derive(Debug, Clone)]
pub struct ParsedScore {
    pub header: ScoreHeader,
    pub events: Vec<TimedEvent>,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedScore {
    pub fn duration_seconds(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.time_seconds)
    }
}

pub fn parse_file(path: impl AsRef<Path>) -> crate::error::Result<ParsedScore> {
    let data = std::fs::read(path.as_ref())?;
    Ok(parse(&data)?)
}

/// Decodes a complete file. Either every track parses or nothing is returned.
pub fn parse(data: &[u8]) -> Result<ParsedScore, FormatError> {
    let mut reader = Reader::new(data);

    if data.len() < 8 || reader.take(4)? != HEADER_MAGIC {
        return Err(FormatError::MissingHeader);
    }
    let header_length = reader.u32()?;
    if header_length < 6 || header_length as usize > data.len() - reader.pos {
        return Err(FormatError::InvalidHeaderLength(header_length));
    }
    let header_end = reader.pos + header_length as usize;
    let format = reader.u16()?;
    let tracks = reader.u16()?;
    let division = Division::from_raw(reader.u16()?)?;
    reader.pos = header_end;

    let header = ScoreHeader {
        format,
        tracks,
        division,
    };
    debug!(format, tracks, ?division, "MIDI header");

    let mut warnings = Vec::new();
    let mut parsed_tracks = Vec::with_capacity(tracks as usize);
    for track in 0..tracks as usize {
        let offset = reader.pos;
        if data.len() - offset < 8 || reader.take(4)? != TRACK_MAGIC {
            return Err(FormatError::MissingTrackHeader { track, offset });
        }
        let length = reader.u32()?;
        if length as usize > data.len() - reader.pos {
            return Err(FormatError::TrackLengthExceedsFile { track, length });
        }
        let end = reader.pos + length as usize;
        let mut track_reader = Reader::bounded(data, reader.pos, end);
        parsed_tracks.push(parse_track(&mut track_reader, track, &mut warnings)?);
        reader.pos = end;
    }

    let tpq = division.ticks_per_quarter();
    let mut events = Vec::new();
    if format == 2 {
        for track in &parsed_tracks {
            let map = TempoMap::new(track.tempos.iter().copied(), tpq);
            events.extend(track.events.iter().map(|e| e.timed(&map)));
        }
    } else {
        let map = TempoMap::new(
            parsed_tracks.iter().flat_map(|t| t.tempos.iter().copied()),
            tpq,
        );
        for track in &parsed_tracks {
            events.extend(track.events.iter().map(|e| e.timed(&map)));
        }
    }

    // Vec::sort_by is stable: ties keep track order, then file order.
    events.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));

    info!(
        events = events.len(),
        warnings = warnings.len(),
        "parsed MIDI file"
    );
    Ok(ParsedScore {
        header,
        events,
        warnings,
    })
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
        }
    }

    fn bounded(data: &'a [u8], pos: usize, end: usize) -> Self {
        Self { data, pos, end }
    }

    fn has_more(&self) -> bool {
        self.pos < self.end
    }

    fn u8(&mut self) -> Result<u8, FormatError> {
        if self.pos >= self.end {
            return Err(FormatError::Truncated { offset: self.pos });
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if n > self.end - self.pos {
            return Err(FormatError::Truncated { offset: self.pos });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, FormatError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, FormatError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Variable-length quantity: 7 bits per byte, top bit set on all but the last.
    fn vlq(&mut self) -> Result<u32, FormatError> {
        let start = self.pos;
        let mut value: u32 = 0;
        for _ in 0..MAX_VLQ_BYTES {
            let b = self.u8()?;
            value = (value << 7) | (b & 0x7F) as u32;
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(FormatError::VlqTooLong { offset: start })
    }
}

#[derive(Debug, Clone, Copy)]
struct TempoChange {
    tick: u64,
    micros_per_quarter: u32,
}

struct TrackEvent {
    tick: u64,
    track: u16,
    message: Vec<u8>,
}

impl TrackEvent {
    fn timed(&self, map: &TempoMap) -> TimedEvent {
        TimedEvent {
            time_seconds: map.seconds_at(self.tick),
            tick: self.tick,
            track: self.track,
            message: self.message.clone(),
        }
    }
}

struct ParsedTrack {
    events: Vec<TrackEvent>,
    tempos: Vec<TempoChange>,
}

fn parse_track(
    reader: &mut Reader<'_>,
    track: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Result<ParsedTrack, FormatError> {
    let mut events = Vec::new();
    let mut tempos = Vec::new();
    let mut ticks: u64 = 0;
    let mut running_status: Option<u8> = None;

    while reader.has_more() {
        ticks += reader.vlq()? as u64;

        let status_offset = reader.pos;
        let first = reader.u8()?;
        let (status, first_data) = if first < 0x80 {
            let status = running_status
                .ok_or(FormatError::RunningStatusWithoutStatus {
                    offset: status_offset,
                })?;
            (status, Some(first))
        } else {
            (first, None)
        };

        let message = match status {
            0x80..=0xEF => {
                running_status = Some(status);
                let data_len = match status & 0xF0 {
                    0xC0 | 0xD0 => 1,
                    _ => 2,
                };
                let mut message = Vec::with_capacity(data_len + 1);
                message.push(status);
                message.extend(first_data);
                while message.len() < data_len + 1 {
                    message.push(reader.u8()?);
                }
                message
            }
            META => {
                running_status = None;
                let meta_type = reader.u8()?;
                let length = reader.vlq()? as usize;
                let body = reader.take(length)?;
                if meta_type == META_SET_TEMPO && length == 3 {
                    let micros_per_quarter =
                        (body[0] as u32) << 16 | (body[1] as u32) << 8 | body[2] as u32;
                    debug!(track, tick = ticks, micros_per_quarter, "tempo change");
                    tempos.push(TempoChange {
                        tick: ticks,
                        micros_per_quarter,
                    });
                }
                let message = reader.data[status_offset..reader.pos].to_vec();
                if meta_type == META_END_OF_TRACK {
                    events.push(TrackEvent {
                        tick: ticks,
                        track: track as u16,
                        message,
                    });
                    break;
                }
                message
            }
            SYSEX_START | SYSEX_ESCAPE => {
                running_status = None;
                let length = reader.vlq()? as usize;
                reader.take(length)?;
                reader.data[status_offset..reader.pos].to_vec()
            }
            _ => {
                running_status = None;
                let skip = match status {
                    0xF1 | 0xF3 => 1,
                    0xF2 => 2,
                    0xF6 | 0xF8 | 0xFA | 0xFB | 0xFC | 0xFE => 0,
                    _ => {
                        return Err(FormatError::UndeterminedLength {
                            status,
                            offset: status_offset,
                        });
                    }
                };
                reader.take(skip)?;
                let warning = ParseWarning {
                    track,
                    offset: status_offset,
                    status,
                };
                warn!("{warning}");
                warnings.push(warning);
                continue;
            }
        };

        events.push(TrackEvent {
            tick: ticks,
            track: track as u16,
            message,
        });
    }

    Ok(ParsedTrack { events, tempos })
}

#[derive(Debug, Clone, Copy)]
struct TempoSegment {
    tick: u64,
    seconds: f64,
    micros_per_quarter: u32,
}

impl TempoSegment {
    fn seconds_at(&self, tick: u64, ticks_per_quarter: f64) -> f64 {
        let seconds_per_tick = self.micros_per_quarter as f64 / 1_000_000.0 / ticks_per_quarter;
        self.seconds + (tick - self.tick) as f64 * seconds_per_tick
    }
}

/// Piecewise tick→seconds conversion.
struct TempoMap {
    segments: Vec<TempoSegment>,
    ticks_per_quarter: f64,
}

impl TempoMap {
    fn new(changes: impl Iterator<Item = TempoChange>, ticks_per_quarter: f64) -> Self {
        let mut changes: Vec<TempoChange> = changes.collect();
        changes.sort_by_key(|c| c.tick);

        let mut segments = vec![TempoSegment {
            tick: 0,
            seconds: 0.0,
            micros_per_quarter: DEFAULT_TEMPO,
        }];
        for change in changes {
            let Some(last) = segments.last_mut() else {
                break;
            };
            if change.tick == last.tick {
                last.micros_per_quarter = change.micros_per_quarter;
            } else {
                let seconds = last.seconds_at(change.tick, ticks_per_quarter);
                segments.push(TempoSegment {
                    tick: change.tick,
                    seconds,
                    micros_per_quarter: change.micros_per_quarter,
                });
            }
        }

        Self {
            segments,
            ticks_per_quarter,
        }
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let idx = self.segments.partition_point(|s| s.tick <= tick);
        // The first segment starts at tick 0, so idx >= 1.
        self.segments[idx.saturating_sub(1)].seconds_at(tick, self.ticks_per_quarter)
    }
}
