//! Minimal CBOR (RFC 8949) support for Cardano transaction bodies.
//!
//! Only definite-length items are produced. Integers always use the shortest
//! head, which is what the ledger hashes.

use crate::error::WalletError;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_SIMPLE: u8 = 7;

const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;

#[derive(Debug, Default, Clone)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn head(&mut self, major: u8, value: u64) -> &mut Self {
        let major = major << 5;
        if value < 24 {
            self.buf.push(major | value as u8);
        } else if value <= u8::MAX as u64 {
            self.buf.push(major | 24);
            self.buf.push(value as u8);
        } else if value <= u16::MAX as u64 {
            self.buf.push(major | 25);
            self.buf.extend_from_slice(&(value as u16).to_be_bytes());
        } else if value <= u32::MAX as u64 {
            self.buf.push(major | 26);
            self.buf.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buf.push(major | 27);
            self.buf.extend_from_slice(&value.to_be_bytes());
        }
        self
    }

    pub fn uint(&mut self, value: u64) -> &mut Self {
        self.head(MAJOR_UNSIGNED, value)
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.head(MAJOR_BYTES, data.len() as u64);
        self.buf.extend_from_slice(data);
        self
    }

    pub fn text(&mut self, text: &str) -> &mut Self {
        self.head(MAJOR_TEXT, text.len() as u64);
        self.buf.extend_from_slice(text.as_bytes());
        self
    }

    pub fn array(&mut self, len: usize) -> &mut Self {
        self.head(MAJOR_ARRAY, len as u64)
    }

    pub fn map(&mut self, len: usize) -> &mut Self {
        self.head(MAJOR_MAP, len as u64)
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.buf
            .push((MAJOR_SIMPLE << 5) | if value { SIMPLE_TRUE } else { SIMPLE_FALSE });
        self
    }

    pub fn null(&mut self) -> &mut Self {
        self.buf.push((MAJOR_SIMPLE << 5) | SIMPLE_NULL);
        self
    }

    /// Append an already encoded item
    pub fn raw(&mut self, encoded: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(encoded);
        self
    }
}

/// Decoded CBOR item, enough to inspect what the encoder writes
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint(u64),
    Negative(u64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tag(u64, Box<Value>),
    Bool(bool),
    Null,
}

impl Value {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up an unsigned-integer key in a map
    pub fn get(&self, key: u64) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_uint() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Decode exactly one item spanning the whole input
pub fn decode(bytes: &[u8]) -> Result<Value, WalletError> {
    let mut decoder = Decoder { bytes, pos: 0 };
    let value = decoder.item()?;
    if decoder.pos != bytes.len() {
        return Err(malformed("trailing bytes"));
    }
    Ok(value)
}

/// Byte length of the first item in `bytes`
pub fn item_len(bytes: &[u8]) -> Result<usize, WalletError> {
    let mut decoder = Decoder { bytes, pos: 0 };
    decoder.item()?;
    Ok(decoder.pos)
}

fn malformed(what: &str) -> WalletError {
    WalletError::InvalidInput(format!("malformed CBOR: {}", what))
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], WalletError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| malformed("unexpected end of input"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn head(&mut self) -> Result<(u8, u8, u64), WalletError> {
        let initial = self.take(1)?[0];
        let major = initial >> 5;
        let info = initial & 0x1f;
        let value = match info {
            0..=23 => info as u64,
            24 => self.take(1)?[0] as u64,
            25 => u16::from_be_bytes([self.take(1)?[0], self.take(1)?[0]]) as u64,
            26 => {
                let b = self.take(4)?;
                u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64
            }
            27 => {
                let b = self.take(8)?;
                u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            _ => return Err(malformed("indefinite lengths are not supported")),
        };
        Ok((major, info, value))
    }

    fn length(value: u64) -> Result<usize, WalletError> {
        usize::try_from(value).map_err(|_| malformed("length overflow"))
    }

    fn item(&mut self) -> Result<Value, WalletError> {
        let (major, info, value) = self.head()?;
        match major {
            MAJOR_UNSIGNED => Ok(Value::Uint(value)),
            MAJOR_NEGATIVE => Ok(Value::Negative(value)),
            MAJOR_BYTES => Ok(Value::Bytes(self.take(Self::length(value)?)?.to_vec())),
            MAJOR_TEXT => {
                let raw = self.take(Self::length(value)?)?;
                String::from_utf8(raw.to_vec())
                    .map(Value::Text)
                    .map_err(|_| malformed("invalid utf-8 text"))
            }
            MAJOR_ARRAY => {
                let len = Self::length(value)?;
                let mut items = Vec::with_capacity(len.min(64));
                for _ in 0..len {
                    items.push(self.item()?);
                }
                Ok(Value::Array(items))
            }
            MAJOR_MAP => {
                let len = Self::length(value)?;
                let mut entries = Vec::with_capacity(len.min(64));
                for _ in 0..len {
                    let key = self.item()?;
                    let val = self.item()?;
                    entries.push((key, val));
                }
                Ok(Value::Map(entries))
            }
            MAJOR_TAG => Ok(Value::Tag(value, Box::new(self.item()?))),
            _ => match info {
                SIMPLE_FALSE => Ok(Value::Bool(false)),
                SIMPLE_TRUE => Ok(Value::Bool(true)),
                SIMPLE_NULL => Ok(Value::Null),
                _ => Err(malformed("unsupported simple value")),
            },
        }
    }
}
