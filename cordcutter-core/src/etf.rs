//! Erlang external term format
//!
//! Packs JSON values into the binary-term encoding the gateway speaks when
//! `encoding=etf` is negotiated, and unpacks received terms back into JSON
//! values.
//!
//! Mapping on the way out: `null` is the atom `nil`, booleans are the atoms
//! `true`/`false`, strings are binaries, arrays are lists and objects are
//! maps with binary keys. On the way in, atoms other than `nil`, `null`,
//! `true` and `false` become strings, tuples become arrays, and charlists
//! (`STRING_EXT`) become strings.

use crate::error::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::{Map, Number, Value};

/// Term format version byte
pub const VERSION: u8 = 131;

const NEW_FLOAT_EXT: u8 = 70;
const SMALL_INTEGER_EXT: u8 = 97;
const INTEGER_EXT: u8 = 98;
const FLOAT_EXT: u8 = 99;
const ATOM_EXT: u8 = 100;
const SMALL_TUPLE_EXT: u8 = 104;
const LARGE_TUPLE_EXT: u8 = 105;
const NIL_EXT: u8 = 106;
const STRING_EXT: u8 = 107;
const LIST_EXT: u8 = 108;
const BINARY_EXT: u8 = 109;
const SMALL_BIG_EXT: u8 = 110;
const LARGE_BIG_EXT: u8 = 111;
const SMALL_ATOM_EXT: u8 = 115;
const MAP_EXT: u8 = 116;
const ATOM_UTF8_EXT: u8 = 118;
const SMALL_ATOM_UTF8_EXT: u8 = 119;

/// Nesting limit for both directions
const MAX_DEPTH: usize = 256;

/// Pack a value into a versioned term
pub fn pack(value: &Value) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_u8(VERSION);
    write_term(&mut buf, value, 0)?;
    Ok(buf.freeze())
}

/// Unpack a versioned term into a value
pub fn unpack(data: &[u8]) -> Result<Value, CodecError> {
    let mut reader = Reader { buf: data };
    let version = reader.u8()?;
    if version != VERSION {
        return Err(decode_err(format!("unknown term version {}", version)));
    }
    let value = reader.term(0)?;
    if reader.buf.has_remaining() {
        return Err(decode_err(format!(
            "{} trailing bytes after term",
            reader.buf.remaining()
        )));
    }
    Ok(value)
}

fn write_term(buf: &mut BytesMut, value: &Value, depth: usize) -> Result<(), CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::Encode("value nested too deeply".to_string()));
    }

    match value {
        Value::Null => write_atom(buf, "nil"),
        Value::Bool(true) => write_atom(buf, "true"),
        Value::Bool(false) => write_atom(buf, "false"),
        Value::Number(n) => write_number(buf, n)?,
        Value::String(s) => write_binary(buf, s.as_bytes())?,
        Value::Array(items) if items.is_empty() => buf.put_u8(NIL_EXT),
        Value::Array(items) => {
            buf.put_u8(LIST_EXT);
            buf.put_u32(len_u32(items.len())?);
            for item in items {
                write_term(buf, item, depth + 1)?;
            }
            buf.put_u8(NIL_EXT);
        }
        Value::Object(map) => {
            buf.put_u8(MAP_EXT);
            buf.put_u32(len_u32(map.len())?);
            for (key, item) in map {
                write_binary(buf, key.as_bytes())?;
                write_term(buf, item, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn write_atom(buf: &mut BytesMut, name: &str) {
    // Only used for the fixed atoms above, all shorter than 256 bytes
    buf.put_u8(SMALL_ATOM_UTF8_EXT);
    buf.put_u8(name.len() as u8);
    buf.put_slice(name.as_bytes());
}

fn write_binary(buf: &mut BytesMut, data: &[u8]) -> Result<(), CodecError> {
    buf.put_u8(BINARY_EXT);
    buf.put_u32(len_u32(data.len())?);
    buf.put_slice(data);
    Ok(())
}

fn write_number(buf: &mut BytesMut, n: &Number) -> Result<(), CodecError> {
    if let Some(v) = n.as_u64() {
        if v <= u8::MAX as u64 {
            buf.put_u8(SMALL_INTEGER_EXT);
            buf.put_u8(v as u8);
        } else if v <= i32::MAX as u64 {
            buf.put_u8(INTEGER_EXT);
            buf.put_i32(v as i32);
        } else {
            write_big(buf, 0, v);
        }
    } else if let Some(v) = n.as_i64() {
        if v >= i32::MIN as i64 {
            buf.put_u8(INTEGER_EXT);
            buf.put_i32(v as i32);
        } else {
            write_big(buf, 1, v.unsigned_abs());
        }
    } else if let Some(v) = n.as_f64() {
        buf.put_u8(NEW_FLOAT_EXT);
        buf.put_f64(v);
    } else {
        return Err(CodecError::Encode(format!("unsupported number {}", n)));
    }
    Ok(())
}

fn write_big(buf: &mut BytesMut, sign: u8, magnitude: u64) {
    let digits = magnitude.to_le_bytes();
    let len = 8 - magnitude.leading_zeros() as usize / 8;
    buf.put_u8(SMALL_BIG_EXT);
    buf.put_u8(len as u8);
    buf.put_u8(sign);
    buf.put_slice(&digits[..len]);
}

fn len_u32(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::Encode(format!("length {} too large", len)))
}

fn decode_err(reason: impl Into<String>) -> CodecError {
    CodecError::Decode(reason.into())
}

/// Bounds-checked reader over a term
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn need(&self, n: usize) -> Result<(), CodecError> {
        if self.buf.remaining() < n {
            return Err(decode_err(format!(
                "term truncated: needed {} bytes, have {}",
                n,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn utf8(&mut self, n: usize) -> Result<String, CodecError> {
        let raw = self.bytes(n)?;
        String::from_utf8(raw.to_vec()).map_err(|e| decode_err(e.to_string()))
    }

    fn term(&mut self, depth: usize) -> Result<Value, CodecError> {
        if depth > MAX_DEPTH {
            return Err(decode_err("term nested too deeply"));
        }

        let tag = self.u8()?;
        match tag {
            SMALL_INTEGER_EXT => Ok(Value::from(self.u8()?)),
            INTEGER_EXT => Ok(Value::from(self.u32()? as i32)),
            NEW_FLOAT_EXT => {
                self.need(8)?;
                Ok(Value::from(self.buf.get_f64()))
            }
            FLOAT_EXT => {
                let raw = self.bytes(31)?;
                let text = std::str::from_utf8(raw)
                    .map_err(|e| decode_err(e.to_string()))?
                    .trim_end_matches('\0');
                let v: f64 = text
                    .trim()
                    .parse()
                    .map_err(|_| decode_err(format!("invalid float {:?}", text)))?;
                Ok(Value::from(v))
            }
            ATOM_EXT | ATOM_UTF8_EXT => {
                let len = self.u16()? as usize;
                let name = self.utf8(len)?;
                Ok(atom(name))
            }
            SMALL_ATOM_EXT | SMALL_ATOM_UTF8_EXT => {
                let len = self.u8()? as usize;
                let name = self.utf8(len)?;
                Ok(atom(name))
            }
            BINARY_EXT => {
                let len = self.u32()? as usize;
                self.utf8(len).map(Value::String)
            }
            STRING_EXT => {
                let len = self.u16()? as usize;
                let raw = self.bytes(len)?;
                Ok(Value::String(raw.iter().map(|&b| b as char).collect()))
            }
            NIL_EXT => Ok(Value::Array(Vec::new())),
            LIST_EXT => {
                let len = self.u32()? as usize;
                let items = self.sequence(len, depth)?;
                match self.u8()? {
                    NIL_EXT => Ok(Value::Array(items)),
                    other => Err(decode_err(format!("improper list tail tag {}", other))),
                }
            }
            SMALL_TUPLE_EXT => {
                let len = self.u8()? as usize;
                self.sequence(len, depth).map(Value::Array)
            }
            LARGE_TUPLE_EXT => {
                let len = self.u32()? as usize;
                self.sequence(len, depth).map(Value::Array)
            }
            MAP_EXT => {
                let len = self.u32()? as usize;
                let mut map = Map::new();
                for _ in 0..len {
                    let key = match self.term(depth + 1)? {
                        Value::String(s) => s,
                        Value::Number(n) => n.to_string(),
                        other => return Err(decode_err(format!("unsupported map key {}", other))),
                    };
                    let value = self.term(depth + 1)?;
                    map.insert(key, value);
                }
                Ok(Value::Object(map))
            }
            SMALL_BIG_EXT => {
                let len = self.u8()? as usize;
                self.big(len)
            }
            LARGE_BIG_EXT => {
                let len = self.u32()? as usize;
                self.big(len)
            }
            other => Err(decode_err(format!("unsupported term tag {}", other))),
        }
    }

    fn sequence(&mut self, len: usize, depth: usize) -> Result<Vec<Value>, CodecError> {
        // Every element takes at least one byte
        self.need(len)?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.term(depth + 1)?);
        }
        Ok(items)
    }

    fn big(&mut self, len: usize) -> Result<Value, CodecError> {
        let sign = self.u8()?;
        let digits = self.bytes(len)?;
        let significant = digits.iter().rposition(|&d| d != 0).map_or(0, |i| i + 1);
        if significant > 8 {
            return Err(decode_err("big integer wider than 64 bits"));
        }
        let mut raw = [0u8; 8];
        raw[..significant].copy_from_slice(&digits[..significant]);
        let magnitude = u64::from_le_bytes(raw);

        if sign == 0 {
            return Ok(Value::from(magnitude));
        }
        let negative = -i128::from(magnitude);
        i64::try_from(negative)
            .map(Value::from)
            .map_err(|_| decode_err("big integer below i64 range"))
    }
}

fn atom(name: String) -> Value {
    match name.as_str() {
        "nil" | "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(name),
    }
}
