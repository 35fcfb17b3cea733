// BER tag-length-value packets with encoding/decoding
// Implements the subset of X.690 BER used by LDAP v3: low tag numbers and definite lengths

use crate::error::BerError;
use std::io::{Cursor, Read};

/// Identifier octet: class bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Universal = 0x00,
    Application = 0x40,
    Context = 0x80,
    Private = 0xC0,
}

impl Class {
    fn from_identifier(identifier: u8) -> Self {
        match identifier & 0xC0 {
            0x00 => Class::Universal,
            0x40 => Class::Application,
            0x80 => Class::Context,
            _ => Class::Private,
        }
    }
}

/// Identifier octet: constructed bit.
pub const CONSTRUCTED: u8 = 0x20;

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_ENUMERATED: u8 = 0x0A;
pub const TAG_SEQUENCE: u8 = 0x10;

/// Largest tag number that fits the low-tag-number form.
const MAX_LOW_TAG: u8 = 0x1E;

/// Element nesting allowed when decoding untrusted bytes without an explicit limit.
pub const DEFAULT_MAX_DECODE_DEPTH: usize = 512;

/// One BER element. Primitive packets carry `value`; constructed packets carry `children`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub class: Class,
    pub constructed: bool,
    pub tag: u8,
    pub value: Vec<u8>,
    pub children: Vec<Packet>,
}

impl Packet {
    pub fn new(class: Class, constructed: bool, tag: u8) -> Self {
        debug_assert!(tag <= MAX_LOW_TAG, "tag {} needs high-tag-number form", tag);
        Self {
            class,
            constructed,
            tag,
            value: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn primitive(class: Class, tag: u8, value: impl Into<Vec<u8>>) -> Self {
        let mut packet = Self::new(class, false, tag);
        packet.set_value(value);
        packet
    }

    /// Universal OCTET STRING.
    pub fn octet_string(value: impl Into<Vec<u8>>) -> Self {
        Self::primitive(Class::Universal, TAG_OCTET_STRING, value)
    }

    /// Empty universal SEQUENCE.
    pub fn sequence() -> Self {
        Self::new(Class::Universal, true, TAG_SEQUENCE)
    }

    pub fn append_child(&mut self, child: Packet) {
        self.children.push(child);
    }

    pub fn set_value(&mut self, value: impl Into<Vec<u8>>) {
        self.value = value.into();
    }

    /// The full identifier octet (class | constructed | tag).
    pub fn identifier(&self) -> u8 {
        let constructed = if self.constructed { CONSTRUCTED } else { 0 };
        self.class as u8 | constructed | (self.tag & 0x1F)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BerWriter::new();
        writer.write_packet(self);
        writer.into_vec()
    }

    /// Decode exactly one element; bytes left over after it are an error.
    pub fn decode(data: &[u8]) -> Result<Packet, BerError> {
        Self::decode_within(data, DEFAULT_MAX_DECODE_DEPTH)
    }

    /// Like `decode`, failing once elements nest deeper than `max_depth`.
    pub fn decode_within(data: &[u8], max_depth: usize) -> Result<Packet, BerError> {
        let mut reader = BerReader::new(data);
        let packet = reader.read_packet_within(max_depth)?;
        if reader.remaining() > 0 {
            return Err(BerError::TrailingBytes {
                count: reader.remaining(),
            });
        }
        Ok(packet)
    }
}

// BER parsing utilities
pub struct BerReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> BerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    fn read_byte(&mut self) -> Result<u8, BerError> {
        let mut buf = [0u8; 1];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| BerError::Truncated { needed: 1, remaining: 0 })?;
        Ok(buf[0])
    }

    pub fn read_tag(&mut self) -> Result<u8, BerError> {
        let identifier = self.read_byte()?;
        if identifier & 0x1F == 0x1F {
            return Err(BerError::HighTagNumber { identifier });
        }
        Ok(identifier)
    }

    pub fn read_length(&mut self) -> Result<usize, BerError> {
        let first_byte = self.read_byte()?;

        if (first_byte & 0x80) == 0 {
            // Short form
            return Ok(first_byte as usize);
        }
        // Long form
        let length_bytes = (first_byte & 0x7F) as usize;
        if length_bytes == 0 {
            return Err(BerError::IndefiniteLength);
        }
        if length_bytes > 4 {
            return Err(BerError::LengthTooLarge { octets: length_bytes });
        }
        self.ensure(length_bytes)?;
        let mut length = 0u32;
        for _ in 0..length_bytes {
            length = (length << 8) | self.read_byte()? as u32;
        }
        Ok(length as usize)
    }

    fn expect_tag(&mut self, expected: u8) -> Result<(), BerError> {
        let tag = self.read_tag()?;
        if (tag & 0x1F) != expected {
            return Err(BerError::UnexpectedTag { expected, found: tag });
        }
        Ok(())
    }

    pub fn read_integer(&mut self) -> Result<i32, BerError> {
        self.expect_tag(TAG_INTEGER)?;
        let length = self.read_length()?;
        if length == 0 || length > 4 {
            return Err(BerError::LengthTooLarge { octets: length });
        }
        let buf = self.read_raw_bytes(length)?;

        let mut value = 0i32;
        for &byte in &buf {
            value = (value << 8) | (byte as i32);
        }

        // Sign extension for negative numbers
        if length < 4 && (buf[0] & 0x80) != 0 {
            value |= !0 << (length * 8);
        }

        Ok(value)
    }

    pub fn read_octet_string(&mut self) -> Result<Vec<u8>, BerError> {
        self.expect_tag(TAG_OCTET_STRING)?;
        self.read_octet_string_value()
    }

    /// Read only length + value (tag already consumed).
    pub fn read_octet_string_value(&mut self) -> Result<Vec<u8>, BerError> {
        let length = self.read_length()?;
        self.read_raw_bytes(length)
    }

    pub fn read_string(&mut self) -> Result<String, BerError> {
        let bytes = self.read_octet_string()?;
        String::from_utf8(bytes).map_err(|_| BerError::InvalidUtf8)
    }

    /// Read a SEQUENCE header and return its content length.
    pub fn read_sequence(&mut self) -> Result<usize, BerError> {
        self.expect_tag(TAG_SEQUENCE)?;
        self.read_length()
    }

    pub fn read_enumerated(&mut self) -> Result<u8, BerError> {
        self.expect_tag(TAG_ENUMERATED)?;
        let length = self.read_length()?;
        if length != 1 {
            return Err(BerError::LengthTooLarge { octets: length });
        }
        self.read_byte()
    }

    pub fn read_boolean(&mut self) -> Result<bool, BerError> {
        self.expect_tag(TAG_BOOLEAN)?;
        let length = self.read_length()?;
        if length != 1 {
            return Err(BerError::LengthTooLarge { octets: length });
        }
        Ok(self.read_byte()? != 0)
    }

    /// Read one whole element, descending into constructed contents.
    pub fn read_packet(&mut self) -> Result<Packet, BerError> {
        self.read_packet_within(DEFAULT_MAX_DECODE_DEPTH)
    }

    pub fn read_packet_within(&mut self, max_depth: usize) -> Result<Packet, BerError> {
        self.read_nested(max_depth, 1)
    }

    fn read_nested(&mut self, max_depth: usize, depth: usize) -> Result<Packet, BerError> {
        if depth > max_depth {
            return Err(BerError::DepthExceeded { max_depth });
        }
        let identifier = self.read_tag()?;
        let length = self.read_length()?;
        let content = self.read_slice(length)?;

        let class = Class::from_identifier(identifier);
        let tag = identifier & 0x1F;
        if identifier & CONSTRUCTED == 0 {
            return Ok(Packet::primitive(class, tag, content));
        }

        // Children borrow from the same input; only primitive values are copied.
        let mut packet = Packet::new(class, true, tag);
        let mut inner = BerReader::new(content);
        while inner.remaining() > 0 {
            packet.append_child(inner.read_nested(max_depth, depth + 1)?);
        }
        Ok(packet)
    }

    /// Borrow the next `n` bytes of the input and step over them.
    fn read_slice(&mut self, n: usize) -> Result<&'a [u8], BerError> {
        self.ensure(n)?;
        let start = self.position();
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + n) as u64);
        Ok(&data[start..start + n])
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len();
        len.saturating_sub(self.position())
    }

    fn ensure(&self, n: usize) -> Result<(), BerError> {
        if self.remaining() < n {
            return Err(BerError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_raw_bytes(&mut self, n: usize) -> Result<Vec<u8>, BerError> {
        self.ensure(n)?;
        let mut buf = vec![0u8; n];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| BerError::Truncated { needed: n, remaining: 0 })?;
        Ok(buf)
    }
}

// BER encoding utilities
#[derive(Debug, Default)]
pub struct BerWriter {
    buffer: Vec<u8>,
}

impl BerWriter {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn write_tag(&mut self, tag: u8) {
        self.buffer.push(tag);
    }

    pub fn write_length(&mut self, length: usize) {
        if length < 128 {
            // Short form
            self.buffer.push(length as u8);
        } else {
            // Long form
            let bytes = long_form_octets(length);
            self.buffer.push(0x80 | bytes.len() as u8);
            self.buffer.extend_from_slice(&bytes);
        }
    }

    pub fn write_integer(&mut self, value: i32) {
        self.write_tag(TAG_INTEGER);
        let bytes = value.to_be_bytes();
        // Drop leading octets that only repeat the sign of the next one.
        let mut start = 0;
        while start < 3 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        self.write_length(4 - start);
        self.buffer.extend_from_slice(&bytes[start..]);
    }

    pub fn write_octet_string(&mut self, data: &[u8]) {
        self.write_tag(TAG_OCTET_STRING);
        self.write_length(data.len());
        self.buffer.extend_from_slice(data);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_octet_string(s.as_bytes());
    }

    pub fn write_boolean(&mut self, value: bool) {
        self.write_tag(TAG_BOOLEAN);
        self.write_length(1);
        self.buffer.push(if value { 0xFF } else { 0x00 });
    }

    pub fn write_enumerated(&mut self, value: u8) {
        self.write_tag(TAG_ENUMERATED);
        self.write_length(1);
        self.buffer.push(value);
    }

    /// Write the identifier and reserve a length byte. Call `end_constructed(pos)` after the content.
    pub fn start_constructed(&mut self, identifier: u8) -> usize {
        self.write_tag(identifier);
        let pos = self.buffer.len();
        self.buffer.push(0);
        pos
    }

    /// Back-patch length at pos for content written after the placeholder.
    /// Supports short and long form.
    pub fn end_constructed(&mut self, pos: usize) {
        let content_len = self.buffer.len() - (pos + 1);
        if content_len < 128 {
            self.buffer[pos] = content_len as u8;
        } else {
            let bytes = long_form_octets(content_len);
            self.buffer[pos] = 0x80 | bytes.len() as u8;
            for (i, b) in bytes.iter().enumerate() {
                self.buffer.insert(pos + 1 + i, *b);
            }
        }
    }

    pub fn start_sequence(&mut self) -> usize {
        self.start_constructed(CONSTRUCTED | TAG_SEQUENCE)
    }

    pub fn end_sequence(&mut self, pos: usize) {
        self.end_constructed(pos);
    }

    pub fn write_packet(&mut self, packet: &Packet) {
        if packet.constructed {
            let pos = self.start_constructed(packet.identifier());
            for child in &packet.children {
                self.write_packet(child);
            }
            self.end_constructed(pos);
        } else {
            self.write_tag(packet.identifier());
            self.write_length(packet.value.len());
            self.buffer.extend_from_slice(&packet.value);
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }
}

fn long_form_octets(length: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut len = length;
    while len > 0 {
        bytes.push((len & 0xFF) as u8);
        len >>= 8;
    }
    bytes.reverse();
    bytes
}
