// RFC 4511 Filter packet tree -> RFC 4515 filter text.

use crate::ber::{Class, Packet, TAG_SEQUENCE};
use crate::config::FilterConfig;
use crate::error::{DecodeError, Error};
use crate::escape::escape_value;
use crate::filter_kind::{FilterKind, SubstringKind};
use tracing::{debug, trace};

pub fn decompile_filter(packet: &Packet) -> Result<String, DecodeError> {
    decompile_filter_with(packet, &FilterConfig::default())
}

pub fn decompile_filter_with(packet: &Packet, config: &FilterConfig) -> Result<String, DecodeError> {
    let mut decompiler = Decompiler {
        out: String::new(),
        depth: 0,
        config,
    };
    decompiler.write_filter(packet)?;
    debug!("Decompiled filter: {}", decompiler.out);
    Ok(decompiler.out)
}

/// Decode a BER-encoded Filter and render it as text.
pub fn decompile_bytes(data: &[u8]) -> Result<String, Error> {
    decompile_bytes_with(data, &FilterConfig::default())
}

/// Like `decompile_bytes`; BER nesting is bounded by `config.decode_depth()`.
pub fn decompile_bytes_with(data: &[u8], config: &FilterConfig) -> Result<String, Error> {
    let packet = Packet::decode_within(data, config.decode_depth())?;
    Ok(decompile_filter_with(&packet, config)?)
}

struct Decompiler<'c> {
    out: String,
    depth: usize,
    config: &'c FilterConfig,
}

impl Decompiler<'_> {
    fn write_filter(&mut self, packet: &Packet) -> Result<(), DecodeError> {
        if packet.class != Class::Context {
            return Err(DecodeError::UnknownTag {
                identifier: packet.identifier(),
            });
        }
        let kind = FilterKind::from_tag(packet.tag)?;
        if packet.constructed != kind.is_constructed() {
            let expected = if kind.is_constructed() { "constructed" } else { "primitive" };
            return Err(DecodeError::malformed(kind, format!("expected a {} node", expected)));
        }

        self.depth += 1;
        if let Some(max_depth) = self.config.max_depth {
            if self.depth > max_depth {
                return Err(DecodeError::DepthExceeded { max_depth });
            }
        }
        trace!("Decompiling {} node at depth {}", kind, self.depth);

        match kind {
            FilterKind::And | FilterKind::Or => {
                if packet.children.is_empty() {
                    return Err(DecodeError::malformed(kind, "empty filter list"));
                }
                self.out.push('(');
                self.out.push_str(kind.operator());
                for child in &packet.children {
                    self.write_filter(child)?;
                }
                self.out.push(')');
            }
            FilterKind::Not => {
                if packet.children.len() != 1 {
                    return Err(DecodeError::malformed(
                        kind,
                        format!("expected 1 child, found {}", packet.children.len()),
                    ));
                }
                self.out.push_str("(!");
                self.write_filter(&packet.children[0])?;
                self.out.push(')');
            }
            FilterKind::EqualityMatch
            | FilterKind::GreaterOrEqual
            | FilterKind::LessOrEqual
            | FilterKind::ApproxMatch => {
                let (attribute, value) = match packet.children.as_slice() {
                    [attribute, value] => (attribute, value),
                    children => {
                        return Err(DecodeError::malformed(
                            kind,
                            format!("expected 2 children, found {}", children.len()),
                        ))
                    }
                };
                let attribute = attribute_description(kind, attribute)?;
                let value = primitive_value(kind, value)?;
                self.out.push('(');
                self.out.push_str(attribute);
                self.out.push_str(kind.operator());
                self.push_value(value);
                self.out.push(')');
            }
            FilterKind::Substrings => self.write_substrings(packet)?,
            FilterKind::Present => {
                let attribute = attribute_description(kind, packet)?;
                self.out.push('(');
                self.out.push_str(attribute);
                self.out.push_str("=*)");
            }
            FilterKind::ExtensibleMatch => {
                return Err(DecodeError::UnsupportedFilterKind { kind });
            }
        }

        self.depth -= 1;
        Ok(())
    }

    fn write_substrings(&mut self, packet: &Packet) -> Result<(), DecodeError> {
        let kind = FilterKind::Substrings;
        let (attribute, segments) = match packet.children.as_slice() {
            [attribute, segments] => (attribute, segments),
            children => {
                return Err(DecodeError::malformed(
                    kind,
                    format!("expected 2 children, found {}", children.len()),
                ))
            }
        };
        let attribute = attribute_description(kind, attribute)?;
        if segments.class != Class::Universal || segments.tag != TAG_SEQUENCE || !segments.constructed {
            return Err(DecodeError::malformed(
                kind,
                format!("expected a SEQUENCE of segments, found 0x{:02x}", segments.identifier()),
            ));
        }
        if segments.children.is_empty() {
            return Err(DecodeError::malformed(kind, "no substring segments"));
        }

        self.out.push('(');
        self.out.push_str(attribute);
        self.out.push('=');

        let last = segments.children.len() - 1;
        for (i, segment) in segments.children.iter().enumerate() {
            let segment_kind = SubstringKind::from_tag(segment.tag)
                .filter(|_| segment.class == Class::Context)
                .ok_or_else(|| {
                    DecodeError::malformed(
                        kind,
                        format!("unknown substring tag 0x{:02x}", segment.identifier()),
                    )
                })?;
            let value = primitive_value(kind, segment)?;
            if value.is_empty() {
                return Err(DecodeError::malformed(kind, "empty substring segment"));
            }
            match segment_kind {
                SubstringKind::Initial if i != 0 => {
                    return Err(DecodeError::malformed(kind, "initial segment is not first"));
                }
                SubstringKind::Final if i != last => {
                    return Err(DecodeError::malformed(kind, "final segment is not last"));
                }
                SubstringKind::Initial => {
                    self.push_value(value);
                    self.out.push('*');
                }
                SubstringKind::Any => {
                    if i == 0 {
                        self.out.push('*');
                    }
                    self.push_value(value);
                    self.out.push('*');
                }
                SubstringKind::Final => {
                    if i == 0 {
                        self.out.push('*');
                    }
                    self.push_value(value);
                }
            }
        }

        self.out.push(')');
        Ok(())
    }

    fn push_value(&mut self, value: &[u8]) {
        self.out
            .push_str(&escape_value(value, self.config.escape_non_ascii));
    }
}

fn primitive_value(kind: FilterKind, packet: &Packet) -> Result<&[u8], DecodeError> {
    if packet.constructed {
        return Err(DecodeError::malformed(kind, "expected a primitive value"));
    }
    Ok(&packet.value)
}

fn attribute_description(kind: FilterKind, packet: &Packet) -> Result<&str, DecodeError> {
    let bytes = primitive_value(kind, packet)?;
    if bytes.is_empty() {
        return Err(DecodeError::malformed(kind, "empty attribute description"));
    }
    std::str::from_utf8(bytes)
        .map_err(|_| DecodeError::malformed(kind, "attribute description is not valid UTF-8"))
}
