//! TraCI wire codec
//!
//! Framing:
//! - message: `u32` total length (including itself), then commands
//! - command: `u8` length (including itself), or `0` followed by a `u32`
//!   length, then the command id and its content
//!
//! Strings are `u32` length + bytes. Typed values are prefixed with a
//! one-byte type tag.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use contracts::{EngineValue, ProgramDefinition};

use super::constants::*;
use crate::error::{LaneClientError, Result};

/// A decoded TraCI value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Ubyte(u8),
    Byte(i8),
    Int(i32),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    DoubleList(Vec<f64>),
    Color([u8; 4]),
    Position2D([f64; 2]),
    Position3D([f64; 3]),
    LonLat([f64; 2]),
    LonLatAlt([f64; 3]),
    RoadMap {
        edge: String,
        pos: f64,
        lane: u8,
    },
    Polygon(Vec<[f64; 2]>),
    Compound(Vec<Value>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Self::Ubyte(_) => "ubyte",
            Self::Byte(_) => "byte",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::StringList(_) => "stringlist",
            Self::DoubleList(_) => "doublelist",
            Self::Color(_) => "color",
            Self::Position2D(_) => "position2d",
            Self::Position3D(_) => "position3d",
            Self::LonLat(_) => "lonlat",
            Self::LonLatAlt(_) => "lonlatalt",
            Self::RoadMap { .. } => "roadmap",
            Self::Polygon(_) => "polygon",
            Self::Compound(_) => "compound",
        }
    }

    /// Values that can appear in a subscription bag
    pub fn into_engine_value(self) -> Option<EngineValue> {
        match self {
            Self::Ubyte(v) => Some(EngineValue::Ubyte(v)),
            Self::Byte(v) => Some(EngineValue::Byte(v)),
            Self::Int(v) => Some(EngineValue::Int(v)),
            Self::Double(v) => Some(EngineValue::Double(v)),
            Self::String(v) => Some(EngineValue::String(v)),
            Self::StringList(v) => Some(EngineValue::StringList(v)),
            Self::Color(v) => Some(EngineValue::Color(v)),
            Self::Position2D(v) => Some(EngineValue::Position2D(v)),
            Self::Position3D(v) => Some(EngineValue::Position3D(v)),
            _ => None,
        }
    }

    pub fn into_string(self) -> Result<String> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(unexpected("string", &other)),
        }
    }

    pub fn into_string_list(self) -> Result<Vec<String>> {
        match self {
            Self::StringList(v) => Ok(v),
            other => Err(unexpected("stringlist", &other)),
        }
    }

    pub fn into_int(self) -> Result<i32> {
        match self {
            Self::Int(v) => Ok(v),
            other => Err(unexpected("int", &other)),
        }
    }

    pub fn into_double(self) -> Result<f64> {
        match self {
            Self::Double(v) => Ok(v),
            other => Err(unexpected("double", &other)),
        }
    }

    pub fn into_compound(self) -> Result<Vec<Value>> {
        match self {
            Self::Compound(v) => Ok(v),
            other => Err(unexpected("compound", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &Value) -> LaneClientError {
    LaneClientError::protocol(format!("expected {expected}, got {}", got.kind()))
}

// ===== Writing =====

pub fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

pub fn put_typed_string(buf: &mut BytesMut, s: &str) {
    buf.put_u8(TYPE_STRING);
    put_string(buf, s);
}

pub fn put_typed_string_list(buf: &mut BytesMut, items: &[String]) {
    buf.put_u8(TYPE_STRINGLIST);
    buf.put_u32(items.len() as u32);
    for item in items {
        put_string(buf, item);
    }
}

pub fn put_typed_int(buf: &mut BytesMut, v: i32) {
    buf.put_u8(TYPE_INTEGER);
    buf.put_i32(v);
}

pub fn put_typed_double(buf: &mut BytesMut, v: f64) {
    buf.put_u8(TYPE_DOUBLE);
    buf.put_f64(v);
}

pub fn put_typed_byte(buf: &mut BytesMut, v: i8) {
    buf.put_u8(TYPE_BYTE);
    buf.put_i8(v);
}

pub fn put_typed_color(buf: &mut BytesMut, rgba: [u8; 4]) {
    buf.put_u8(TYPE_COLOR);
    buf.put_slice(&rgba);
}

pub fn put_compound_header(buf: &mut BytesMut, items: i32) {
    buf.put_u8(TYPE_COMPOUND);
    buf.put_i32(items);
}

/// Frame one command
pub fn encode_command(cmd: u8, content: &[u8]) -> BytesMut {
    let total = 1 + 1 + content.len();
    let mut buf = BytesMut::with_capacity(total + 4);
    if total <= u8::MAX as usize {
        buf.put_u8(total as u8);
    } else {
        buf.put_u8(0);
        buf.put_u32((total + 4) as u32);
    }
    buf.put_u8(cmd);
    buf.put_slice(content);
    buf
}

/// Frame a message of one or more commands
pub fn encode_message(commands: &[BytesMut]) -> Bytes {
    let body: usize = commands.iter().map(|c| c.len()).sum();
    let mut buf = BytesMut::with_capacity(4 + body);
    buf.put_u32((4 + body) as u32);
    for command in commands {
        buf.put_slice(command);
    }
    buf.freeze()
}

/// Content of a get-variable command
pub fn get_variable(variable: u8, object_id: &str) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(variable);
    put_string(&mut buf, object_id);
    buf
}

/// Content of a set-variable command; the caller appends the typed value.
pub fn set_variable(variable: u8, object_id: &str) -> BytesMut {
    get_variable(variable, object_id)
}

/// Content of a variable subscription; no variables unsubscribes.
pub fn subscribe(object_id: &str, variables: &[u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_f64(SUBSCRIBE_BEGIN);
    buf.put_f64(SUBSCRIBE_END);
    put_string(&mut buf, object_id);
    buf.put_u8(variables.len() as u8);
    buf.put_slice(variables);
    buf
}

// ===== Reading =====

/// Cursor over a received message or command body
#[derive(Debug, Clone)]
pub struct Reader {
    buf: Bytes,
}

impl Reader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(LaneClientError::protocol(format!(
                "truncated: need {n} bytes, have {}",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    fn read_count(&mut self) -> Result<usize> {
        let n = self.read_i32()?;
        usize::try_from(n).map_err(|_| LaneClientError::protocol(format!("negative count {n}")))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        self.ensure(len)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec())
            .map_err(|e| LaneClientError::protocol(format!("invalid utf-8 string: {e}")))
    }

    pub fn read_string_list(&mut self) -> Result<Vec<String>> {
        let n = self.read_count()?;
        (0..n).map(|_| self.read_string()).collect()
    }

    /// Read a type tag and the value it announces
    pub fn read_value(&mut self) -> Result<Value> {
        let tag = self.read_u8()?;
        self.read_value_of(tag)
    }

    fn read_value_of(&mut self, tag: u8) -> Result<Value> {
        let value = match tag {
            TYPE_UBYTE => Value::Ubyte(self.read_u8()?),
            TYPE_BYTE => Value::Byte(self.read_i8()?),
            TYPE_INTEGER => Value::Int(self.read_i32()?),
            TYPE_DOUBLE => Value::Double(self.read_f64()?),
            TYPE_STRING => Value::String(self.read_string()?),
            TYPE_STRINGLIST => Value::StringList(self.read_string_list()?),
            TYPE_DOUBLELIST => {
                let n = self.read_count()?;
                Value::DoubleList((0..n).map(|_| self.read_f64()).collect::<Result<_>>()?)
            }
            TYPE_COLOR => {
                self.ensure(4)?;
                let mut rgba = [0u8; 4];
                self.buf.copy_to_slice(&mut rgba);
                Value::Color(rgba)
            }
            POSITION_2D => Value::Position2D([self.read_f64()?, self.read_f64()?]),
            POSITION_3D => {
                Value::Position3D([self.read_f64()?, self.read_f64()?, self.read_f64()?])
            }
            POSITION_LON_LAT => Value::LonLat([self.read_f64()?, self.read_f64()?]),
            POSITION_LON_LAT_ALT => {
                Value::LonLatAlt([self.read_f64()?, self.read_f64()?, self.read_f64()?])
            }
            POSITION_ROADMAP => Value::RoadMap {
                edge: self.read_string()?,
                pos: self.read_f64()?,
                lane: self.read_u8()?,
            },
            TYPE_POLYGON => {
                let n = self.read_u8()? as usize;
                Value::Polygon(
                    (0..n)
                        .map(|_| -> Result<[f64; 2]> { Ok([self.read_f64()?, self.read_f64()?]) })
                        .collect::<Result<_>>()?,
                )
            }
            TYPE_COMPOUND => {
                let n = self.read_count()?;
                Value::Compound((0..n).map(|_| self.read_value()).collect::<Result<_>>()?)
            }
            other => {
                return Err(LaneClientError::protocol(format!(
                    "unknown type tag 0x{other:02x}"
                )))
            }
        };
        Ok(value)
    }

    /// Split off the next command: returns its id and a reader over its content
    pub fn read_command(&mut self) -> Result<(u8, Reader)> {
        let short = self.read_u8()? as usize;
        let (len, header) = if short == 0 {
            (self.read_u32()? as usize, 5)
        } else {
            (short, 1)
        };
        if len < header + 1 {
            return Err(LaneClientError::protocol(format!(
                "command length {len} too short"
            )));
        }
        let body_len = len - header;
        self.ensure(body_len)?;
        let mut body = Reader::new(self.buf.split_to(body_len));
        let cmd = body.read_u8()?;
        Ok((cmd, body))
    }

    /// Read the status response that precedes every answer
    pub fn read_status(&mut self, expected_cmd: u8, command: &str) -> Result<()> {
        let (cmd, mut body) = self.read_command()?;
        if cmd != expected_cmd {
            return Err(LaneClientError::protocol(format!(
                "status for 0x{cmd:02x}, expected 0x{expected_cmd:02x}"
            )));
        }
        let result = body.read_u8()?;
        let description = body.read_string()?;
        match result {
            RTYPE_OK => Ok(()),
            RTYPE_NOTIMPLEMENTED => Err(LaneClientError::rejected(
                command,
                format!("not implemented: {description}"),
            )),
            RTYPE_ERR => Err(LaneClientError::rejected(command, description)),
            other => Err(LaneClientError::protocol(format!(
                "unknown status 0x{other:02x}: {description}"
            ))),
        }
    }
}

/// One object's block of a subscription response
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionBlock {
    pub response: u8,
    pub object_id: String,
    /// `(variable, value)`; variables the engine failed to read are dropped
    pub values: Vec<(u8, Value)>,
}

impl SubscriptionBlock {
    /// Parse the content of a variable subscription response command
    pub fn read(response: u8, body: &mut Reader) -> Result<Self> {
        let object_id = body.read_string()?;
        let count = body.read_u8()?;
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let variable = body.read_u8()?;
            let status = body.read_u8()?;
            let value = body.read_value()?;
            if status == RTYPE_OK {
                values.push((variable, value));
            } else {
                tracing::debug!(
                    object_id = %object_id,
                    variable,
                    "subscription variable not available"
                );
            }
        }
        Ok(Self {
            response,
            object_id,
            values,
        })
    }
}

/// Decode `TL_COMPLETE_DEFINITION_RYG` into program definitions
pub fn decode_program_logics(value: Value) -> Result<Vec<ProgramDefinition>> {
    value
        .into_compound()?
        .into_iter()
        .map(decode_program_logic)
        .collect()
}

fn decode_program_logic(value: Value) -> Result<ProgramDefinition> {
    let items = value.into_compound()?;
    let [program_id, _kind, _current_phase, phases, parameters]: [Value; 5] =
        items.try_into().map_err(|items: Vec<Value>| {
            LaneClientError::protocol(format!("program logic with {} items", items.len()))
        })?;

    let phases = phases
        .into_compound()?
        .into_iter()
        .map(|phase| {
            let mut fields = phase.into_compound()?.into_iter();
            let _duration = fields.next();
            fields
                .next()
                .ok_or_else(|| LaneClientError::protocol("phase without state"))?
                .into_string()
        })
        .collect::<Result<Vec<_>>>()?;

    let parameters = parameters
        .into_compound()?
        .into_iter()
        .map(|pair| {
            let pair = pair.into_string_list()?;
            match <[String; 2]>::try_from(pair) {
                Ok([key, value]) => Ok((key, value)),
                Err(pair) => Err(LaneClientError::protocol(format!(
                    "parameter entry with {} items",
                    pair.len()
                ))),
            }
        })
        .collect::<Result<_>>()?;

    Ok(ProgramDefinition {
        program_id: program_id.into_string()?,
        phases,
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_over(buf: BytesMut) -> Reader {
        Reader::new(buf.freeze())
    }

    #[test]
    fn test_short_and_extended_command_framing() {
        let short = encode_command(CMD_SIMSTEP, &[0u8; 8]);
        assert_eq!(short[0], 10);
        assert_eq!(short[1], CMD_SIMSTEP);

        let long = encode_command(CMD_SET_VEHICLE_VARIABLE, &[7u8; 300]);
        assert_eq!(long[0], 0);
        assert_eq!(u32::from_be_bytes([long[1], long[2], long[3], long[4]]), 306);

        let mut reader = Reader::new(encode_message(&[short, long]).slice(4..));
        let (cmd, body) = reader.read_command().unwrap();
        assert_eq!((cmd, body.remaining()), (CMD_SIMSTEP, 8));
        let (cmd, body) = reader.read_command().unwrap();
        assert_eq!((cmd, body.remaining()), (CMD_SET_VEHICLE_VARIABLE, 300));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_status_error_is_rejection() {
        let mut content = BytesMut::new();
        content.put_u8(RTYPE_ERR);
        put_string(&mut content, "Vehicle 'x' is not known");
        let mut reader = reader_over(encode_command(CMD_SET_VEHICLE_VARIABLE, &content));

        let err = reader
            .read_status(CMD_SET_VEHICLE_VARIABLE, "vehicle.remove")
            .unwrap_err();
        match err {
            LaneClientError::CommandRejected { command, message } => {
                assert_eq!(command, "vehicle.remove");
                assert!(message.contains("not known"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_input_is_protocol_error() {
        let mut reader = Reader::new(Bytes::from_static(&[0, 0, 0, 9, b'a']));
        assert!(matches!(
            reader.read_string(),
            Err(LaneClientError::Protocol { .. })
        ));
    }

    #[test]
    fn test_read_typed_values() {
        let mut buf = BytesMut::new();
        put_typed_string_list(&mut buf, &["a".into(), "b".into()]);
        put_typed_color(&mut buf, [1, 2, 3, 4]);
        buf.put_u8(POSITION_3D);
        buf.put_f64(1.0);
        buf.put_f64(2.0);
        buf.put_f64(3.0);
        let mut reader = reader_over(buf);

        assert_eq!(
            reader.read_value().unwrap(),
            Value::StringList(vec!["a".into(), "b".into()])
        );
        assert_eq!(reader.read_value().unwrap(), Value::Color([1, 2, 3, 4]));
        assert_eq!(
            reader.read_value().unwrap().into_engine_value(),
            Some(EngineValue::Position3D([1.0, 2.0, 3.0]))
        );
    }

    #[test]
    fn test_unknown_tag() {
        let mut reader = Reader::new(Bytes::from_static(&[0x42]));
        assert!(reader.read_value().is_err());
    }

    fn put_phase(buf: &mut BytesMut, state: &str) {
        put_compound_header(buf, 6);
        put_typed_double(buf, 30.0);
        put_typed_string(buf, state);
        put_typed_double(buf, 30.0);
        put_typed_double(buf, 30.0);
        put_compound_header(buf, 0);
        put_typed_string(buf, "");
    }

    #[test]
    fn test_decode_program_logics() {
        let mut buf = BytesMut::new();
        put_compound_header(&mut buf, 1);
        put_compound_header(&mut buf, 5);
        put_typed_string(&mut buf, "0");
        put_typed_int(&mut buf, 0);
        put_typed_int(&mut buf, 0);
        put_compound_header(&mut buf, 2);
        put_phase(&mut buf, "GGrr");
        put_phase(&mut buf, "rrGG");
        put_compound_header(&mut buf, 2);
        put_typed_string_list(&mut buf, &["linkSignalID:0".into(), "1032".into()]);
        put_typed_string_list(&mut buf, &["linkSignalID:1".into(), "1032".into()]);

        let value = reader_over(buf).read_value().unwrap();
        let programs = decode_program_logics(value).unwrap();
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].program_id, "0");
        assert_eq!(programs[0].phases, vec!["GGrr", "rrGG"]);
        assert_eq!(programs[0].parameters["linkSignalID:1"], "1032");
    }

    #[test]
    fn test_subscription_block_drops_failed_variables() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "918");
        buf.put_u8(2);
        buf.put_u8(TL_CURRENT_PROGRAM);
        buf.put_u8(RTYPE_OK);
        put_typed_string(&mut buf, "0");
        buf.put_u8(TL_CURRENT_PHASE);
        buf.put_u8(RTYPE_ERR);
        put_typed_string(&mut buf, "unavailable");

        let block =
            SubscriptionBlock::read(RESPONSE_SUBSCRIBE_TL_VARIABLE, &mut reader_over(buf)).unwrap();
        assert_eq!(block.object_id, "918");
        assert_eq!(
            block.values,
            vec![(TL_CURRENT_PROGRAM, Value::String("0".into()))]
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_input_never_panics(raw in prop::collection::vec(any::<u8>(), 0..256)) {
                let mut reader = Reader::new(Bytes::from(raw));
                while !reader.is_empty() {
                    if reader.read_value().is_err() {
                        break;
                    }
                }
            }

            #[test]
            fn truncated_string_list_is_rejected(
                items in prop::collection::vec("[a-z0-9:]{1,12}", 1..6),
                cut in 1usize..32,
            ) {
                let mut buf = BytesMut::new();
                put_typed_string_list(&mut buf, &items);
                let keep = buf.len().saturating_sub(cut).max(1);
                let mut reader = Reader::new(buf.freeze().slice(..keep));
                prop_assert!(reader.read_value().is_err());
            }
        }
    }
}
