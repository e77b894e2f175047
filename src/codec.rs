use crate::error::CodecError;
use crate::value::{take, take_array, Value, ValueKind};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::collections::HashMap;

/// Marks the first byte of every frame.
pub const FRAME_START: u8 = 0x1E;
/// Marks the last byte of every frame.
pub const FRAME_END: u8 = 0x17;
/// Fixed separator between frame fields. Channel names never contain NUL,
/// so the first zero byte after a name always starts a separator.
pub const SEP: [u8; 3] = [0, 0, 0];

const KIND_DECLARE: u8 = b'a';
const KIND_DATA: u8 = b'd';
const KIND_CYCLE: u8 = b'c';

// The framing has no checksum; self-synchronization depends on these
// constants staying distinct.
const_assert!(FRAME_START != FRAME_END);
const_assert!(FRAME_START != 0 && FRAME_END != 0);
const_assert!(FRAME_START != b'\n' && FRAME_END != b'\n');

/// One sampled channel value, tagged with the tick that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub name: String,
    pub value: Value,
    pub cycle: u64,
}

/// Stateful encoder for the capture path.
///
/// The first sample of a channel emits a declaration frame binding a
/// reference id to the channel's name and kind; data frames thereafter carry
/// only the reference. A sample equal to the channel's previous payload
/// emits nothing, so the stream stays sparse.
#[derive(Debug, Default)]
pub struct FrameEncoder {
    references: HashMap<String, u32>,
    last_payload: HashMap<u32, Vec<u8>>,
    next_reference: u32,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes one record into zero, one or two frames (declaration first
    /// when the channel is new).
    pub fn encode_record(&mut self, record: &SampleRecord) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();

        let reference = match self.references.get(&record.name) {
            Some(reference) => *reference,
            None => {
                let reference = self.next_reference;
                self.next_reference += 1;
                self.references.insert(record.name.clone(), reference);
                frames.push(encode_declaration(
                    &record.name,
                    record.value.kind(),
                    reference,
                ));
                reference
            }
        };

        let mut payload = Vec::new();
        record.value.encode_payload(&mut payload);

        if self.last_payload.get(&reference) == Some(&payload) {
            return frames;
        }

        frames.push(encode_data(reference, record.value.kind(), &payload));
        self.last_payload.insert(reference, payload);

        frames
    }

    /// Cycle-boundary frame; `early` marks ticks recorded before the first
    /// real data of the run.
    pub fn encode_cycle_mark(early: bool) -> Vec<u8> {
        let mut frame = frame_head(KIND_CYCLE);
        frame.push(u8::from(early));
        frame_tail(&mut frame);
        frame
    }
}

fn frame_head(kind: u8) -> Vec<u8> {
    let mut frame = vec![FRAME_START, kind];
    frame.extend_from_slice(&SEP);
    frame
}

fn frame_tail(frame: &mut Vec<u8>) {
    frame.extend_from_slice(&SEP);
    frame.push(FRAME_END);
}

fn encode_declaration(name: &str, kind: ValueKind, reference: u32) -> Vec<u8> {
    let mut frame = frame_head(KIND_DECLARE);
    frame.extend_from_slice(name.as_bytes());
    frame.extend_from_slice(&SEP);
    frame.push(kind.tag());
    frame.extend_from_slice(&reference.to_be_bytes());
    frame_tail(&mut frame);
    frame
}

fn encode_data(reference: u32, kind: ValueKind, payload: &[u8]) -> Vec<u8> {
    let mut frame = frame_head(KIND_DATA);
    frame.extend_from_slice(&reference.to_be_bytes());
    frame.extend_from_slice(&SEP);
    frame.push(kind.tag());
    frame.extend_from_slice(payload);
    frame_tail(&mut frame);
    frame
}

/// One decoded element of a captured stream, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    Declare {
        reference: u32,
        name: String,
        kind: ValueKind,
    },
    Data {
        reference: u32,
        value: Value,
    },
    CycleMark {
        early: bool,
    },
    /// Free text found between frames (banner lines, operator messages).
    Message(String),
}

/// Result of decoding a full stream. `truncated` is set when a structural
/// error inside a frame ended the usable stream early; everything decoded
/// before that point is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStream {
    pub events: Vec<FrameEvent>,
    pub truncated: bool,
}

/// Decodes a captured byte stream. Pure function of its input: no I/O.
pub fn decode_stream(bytes: &[u8]) -> DecodedStream {
    let mut input = bytes;
    let mut events = Vec::new();
    let mut truncated = false;

    while !input.is_empty() {
        if input[0] == FRAME_START {
            match decode_frame(&mut input) {
                Ok(event) => events.push(event),
                Err(_) => {
                    truncated = true;
                    break;
                }
            }
        } else {
            let line_end = input
                .iter()
                .position(|&b| b == b'\n')
                .unwrap_or(input.len());
            let (line, rest) = input.split_at(line_end);
            input = rest.get(1..).unwrap_or(&[]);

            let text = String::from_utf8_lossy(line).trim_end().to_string();
            if !text.is_empty() {
                events.push(FrameEvent::Message(text));
            }
        }
    }

    DecodedStream { events, truncated }
}

fn decode_frame(input: &mut &[u8]) -> Result<FrameEvent, CodecError> {
    expect_byte(input, FRAME_START)?;
    let kind = take_array::<1>(input)?[0];
    expect_sep(input)?;

    let event = match kind {
        KIND_DECLARE => {
            let name = decode_name(input)?;
            expect_sep(input)?;
            let value_kind = ValueKind::from_tag(take_array::<1>(input)?[0])?;
            let reference = u32::from_be_bytes(take_array::<4>(input)?);
            FrameEvent::Declare {
                reference,
                name,
                kind: value_kind,
            }
        }
        KIND_DATA => {
            let reference = u32::from_be_bytes(take_array::<4>(input)?);
            expect_sep(input)?;
            let value_kind = ValueKind::from_tag(take_array::<1>(input)?[0])?;
            let value = Value::decode_payload(value_kind, input)?;
            FrameEvent::Data { reference, value }
        }
        KIND_CYCLE => {
            let flag = take_array::<1>(input)?[0];
            let early = match flag {
                0 => false,
                1 => true,
                other => return Err(CodecError::InvalidBoolean(other)),
            };
            FrameEvent::CycleMark { early }
        }
        other => return Err(CodecError::UnknownFrameKind(other)),
    };

    expect_sep(input)?;
    expect_byte(input, FRAME_END)?;
    Ok(event)
}

fn decode_name(input: &mut &[u8]) -> Result<String, CodecError> {
    let end = input
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::ShortFrame)?;
    let bytes = take(input, end)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}

fn expect_sep(input: &mut &[u8]) -> Result<(), CodecError> {
    if take_array::<3>(input)? == SEP {
        Ok(())
    } else {
        Err(CodecError::BadMarker)
    }
}

fn expect_byte(input: &mut &[u8], expected: u8) -> Result<(), CodecError> {
    let got = take_array::<1>(input)?[0];
    if got == expected {
        Ok(())
    } else {
        Err(CodecError::BadMarker)
    }
}
