// RFC 4515 filter text -> RFC 4511 Filter packet tree.
//
// Recursive descent with a single forward cursor. Every sub-parser starts on the byte after
// its construct's opening token and leaves the cursor just past the closing `)`.

use crate::ber::{Class, Packet};
use crate::config::FilterConfig;
use crate::error::ParseError;
use crate::escape::{hex_digit, unescape_value};
use crate::filter_kind::{FilterKind, SubstringKind};
use tracing::{debug, trace};

/// Compile a parenthesized filter such as `(&(sn=Miller)(givenName=Bob))`.
pub fn compile_filter(text: &str) -> Result<Packet, ParseError> {
    compile_filter_with(text, &FilterConfig::default())
}

pub fn compile_filter_with(text: &str, config: &FilterConfig) -> Result<Packet, ParseError> {
    debug!("Compiling filter: {}", text);
    if !text.starts_with('(') {
        return Err(ParseError::Unparenthesized {
            fragment: text.to_string(),
        });
    }

    let mut compiler = Compiler {
        text,
        bytes: text.as_bytes(),
        pos: 0,
        depth: 0,
        max_depth: config.max_depth,
    };
    let packet = compiler.parse_filter()?;
    if compiler.pos < text.len() {
        return Err(ParseError::TrailingInput {
            fragment: compiler.fragment(compiler.pos, text.len()),
        });
    }

    debug!("Compiled filter {} (tag {})", text, packet.tag);
    Ok(packet)
}

/// Compile filter text straight to its BER encoding.
pub fn compile_to_bytes(text: &str) -> Result<Vec<u8>, ParseError> {
    Ok(compile_filter(text)?.to_bytes())
}

struct Compiler<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
    max_depth: Option<usize>,
}

impl<'a> Compiler<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn fragment(&self, start: usize, end: usize) -> String {
        let end = end.min(self.bytes.len());
        String::from_utf8_lossy(&self.bytes[start..end]).into_owned()
    }

    /// From `start` through the next `)` (or to the end of input).
    fn item_fragment(&self, start: usize) -> String {
        let end = self.bytes[self.pos..]
            .iter()
            .position(|&b| b == b')')
            .map(|i| self.pos + i + 1)
            .unwrap_or(self.bytes.len());
        self.fragment(start, end)
    }

    fn unbalanced(&self, start: usize) -> ParseError {
        ParseError::UnbalancedParens {
            fragment: self.fragment(start, self.bytes.len()),
        }
    }

    fn current_char(&self) -> char {
        self.text
            .get(self.pos..)
            .and_then(|rest| rest.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    /// Cursor is on `(`.
    fn parse_filter(&mut self) -> Result<Packet, ParseError> {
        let start = self.pos;
        self.depth += 1;
        if let Some(max_depth) = self.max_depth {
            if self.depth > max_depth {
                return Err(ParseError::DepthExceeded { max_depth });
            }
        }
        self.pos += 1;

        let packet = match self.peek() {
            None => return Err(self.unbalanced(start)),
            Some(b'&') => self.parse_set(FilterKind::And, start)?,
            Some(b'|') => self.parse_set(FilterKind::Or, start)?,
            Some(b'!') => self.parse_not(start)?,
            Some(_) => self.parse_item(start)?,
        };

        self.depth -= 1;
        Ok(packet)
    }

    /// Parenthesized sub-filters following an `&`, `|` or `!`, up to and including the closing `)`.
    fn parse_subfilters(&mut self, start: usize) -> Result<Vec<Packet>, ParseError> {
        self.pos += 1;
        let mut children = Vec::new();
        loop {
            match self.peek() {
                Some(b'(') => children.push(self.parse_filter()?),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(children);
                }
                None => return Err(self.unbalanced(start)),
                Some(_) => {
                    return Err(ParseError::UnexpectedCharacter {
                        found: self.current_char(),
                        fragment: self.item_fragment(start),
                    })
                }
            }
        }
    }

    fn parse_set(&mut self, kind: FilterKind, start: usize) -> Result<Packet, ParseError> {
        let children = self.parse_subfilters(start)?;
        if children.is_empty() {
            return Err(ParseError::EmptyFilterList {
                fragment: self.fragment(start, self.pos),
            });
        }
        trace!("{} filter with {} children", kind, children.len());

        let mut packet = Packet::new(Class::Context, true, kind.tag());
        for child in children {
            packet.append_child(child);
        }
        Ok(packet)
    }

    fn parse_not(&mut self, start: usize) -> Result<Packet, ParseError> {
        let mut children = self.parse_subfilters(start)?;
        if children.len() != 1 {
            return Err(ParseError::MissingOperand {
                fragment: self.fragment(start, self.pos),
            });
        }

        let mut packet = Packet::new(Class::Context, true, FilterKind::Not.tag());
        packet.children.append(&mut children);
        Ok(packet)
    }

    /// `attr op value)` where op is one of `=`, `~=`, `>=`, `<=`.
    fn parse_item(&mut self, start: usize) -> Result<Packet, ParseError> {
        let text = self.text;
        let attr_start = self.pos;
        let (kind, attr_end) = loop {
            match self.peek() {
                None => return Err(self.unbalanced(start)),
                Some(b'=') => {
                    self.pos += 1;
                    break (FilterKind::EqualityMatch, self.pos - 1);
                }
                Some(op @ (b'~' | b'>' | b'<')) => {
                    if self.bytes.get(self.pos + 1) != Some(&b'=') {
                        return Err(ParseError::UnknownOperator {
                            fragment: self.item_fragment(start),
                        });
                    }
                    let kind = match op {
                        b'~' => FilterKind::ApproxMatch,
                        b'>' => FilterKind::GreaterOrEqual,
                        _ => FilterKind::LessOrEqual,
                    };
                    self.pos += 2;
                    break (kind, self.pos - 2);
                }
                Some(b')') => {
                    return Err(ParseError::UnknownOperator {
                        fragment: self.fragment(start, self.pos + 1),
                    })
                }
                Some(b'(') => {
                    return Err(ParseError::UnbalancedParens {
                        fragment: self.fragment(start, self.pos + 1),
                    })
                }
                Some(_) => self.pos += 1,
            }
        };

        let attribute = &text[attr_start..attr_end];
        // attr:dn:rule:=value
        if attribute.contains(':') {
            return Err(ParseError::UnsupportedFilterKind {
                kind: FilterKind::ExtensibleMatch,
                fragment: self.item_fragment(start),
            });
        }
        if attribute.is_empty() {
            return Err(ParseError::EmptyAttribute {
                fragment: self.item_fragment(start),
            });
        }

        let value_start = self.pos;
        let mut wildcards = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.unbalanced(start)),
                Some(b')') => break,
                Some(b'(') => {
                    return Err(ParseError::UnbalancedParens {
                        fragment: self.fragment(start, self.pos + 1),
                    })
                }
                Some(b'\\') => {
                    let valid = hex_digit(self.bytes.get(self.pos + 1)).is_some()
                        && hex_digit(self.bytes.get(self.pos + 2)).is_some();
                    if !valid {
                        return Err(ParseError::MalformedEscape {
                            fragment: self.fragment(self.pos, self.pos + 3),
                        });
                    }
                    self.pos += 3;
                }
                Some(b'*') => {
                    if kind != FilterKind::EqualityMatch {
                        return Err(ParseError::UnexpectedCharacter {
                            found: '*',
                            fragment: self.item_fragment(start),
                        });
                    }
                    wildcards.push(self.pos);
                    self.pos += 1;
                }
                // Control bytes must be written as \XX.
                Some(b) if b.is_ascii_control() => {
                    return Err(ParseError::UnexpectedCharacter {
                        found: b as char,
                        fragment: self.item_fragment(start),
                    });
                }
                Some(_) => self.pos += 1,
            }
        }
        let value_end = self.pos;
        self.pos += 1;

        let raw = &text[value_start..value_end];
        if kind == FilterKind::EqualityMatch && raw == "*" {
            trace!("Present filter on {}", attribute);
            return Ok(Packet::primitive(
                Class::Context,
                FilterKind::Present.tag(),
                attribute,
            ));
        }
        if !wildcards.is_empty() {
            return self.substrings(attribute, value_start, value_end, &wildcards, start);
        }

        trace!("{} filter on {}", kind, attribute);
        let mut packet = Packet::new(Class::Context, true, kind.tag());
        packet.append_child(Packet::octet_string(attribute));
        packet.append_child(Packet::octet_string(unescape_value(raw)?));
        Ok(packet)
    }

    /// Split the value at each unescaped `*`: a non-empty first piece is `initial`, a non-empty
    /// last piece is `final`, every piece in between is an `any`.
    fn substrings(
        &self,
        attribute: &str,
        value_start: usize,
        value_end: usize,
        wildcards: &[usize],
        start: usize,
    ) -> Result<Packet, ParseError> {
        let mut bounds = Vec::with_capacity(wildcards.len() + 1);
        let mut prev = value_start;
        for &star in wildcards {
            bounds.push((prev, star));
            prev = star + 1;
        }
        bounds.push((prev, value_end));

        let last = bounds.len() - 1;
        let mut segments = Packet::sequence();
        for (i, &(from, to)) in bounds.iter().enumerate() {
            let piece = &self.text[from..to];
            let kind = match i {
                0 if piece.is_empty() => continue,
                0 => SubstringKind::Initial,
                i if i == last && piece.is_empty() => continue,
                i if i == last => SubstringKind::Final,
                _ if piece.is_empty() => {
                    return Err(ParseError::EmptySubstring {
                        fragment: self.fragment(start, self.pos),
                    })
                }
                _ => SubstringKind::Any,
            };
            segments.append_child(Packet::primitive(
                Class::Context,
                kind.tag(),
                unescape_value(piece)?,
            ));
        }
        trace!("Substrings filter on {} with {} segments", attribute, segments.children.len());

        let mut packet = Packet::new(Class::Context, true, FilterKind::Substrings.tag());
        packet.append_child(Packet::octet_string(attribute));
        packet.append_child(segments);
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILTERS: [(&str, FilterKind); 11] = [
        ("(&(sn=Miller)(givenName=Bob))", FilterKind::And),
        ("(|(sn=Miller)(givenName=Bob))", FilterKind::Or),
        ("(!(sn=Miller))", FilterKind::Not),
        ("(sn=Miller)", FilterKind::EqualityMatch),
        ("(sn=Mill*)", FilterKind::Substrings),
        ("(sn=*Mill)", FilterKind::Substrings),
        ("(sn=*Mill*)", FilterKind::Substrings),
        ("(sn>=Miller)", FilterKind::GreaterOrEqual),
        ("(sn<=Miller)", FilterKind::LessOrEqual),
        ("(sn=*)", FilterKind::Present),
        ("(sn~=Miller)", FilterKind::ApproxMatch),
    ];

    fn segments(packet: &Packet) -> Vec<(SubstringKind, Vec<u8>)> {
        packet.children[1]
            .children
            .iter()
            .map(|c| (SubstringKind::from_tag(c.tag).unwrap(), c.value.clone()))
            .collect()
    }

    #[test]
    fn test_compile_tags() {
        for (text, kind) in FILTERS {
            let packet = compile_filter(text).unwrap();
            assert_eq!(packet.tag, kind.tag(), "{}", text);
            assert_eq!(packet.class, Class::Context);
            assert_eq!(packet.constructed, kind.is_constructed(), "{}", text);
        }
    }

    #[test]
    fn test_compile_equality_bytes() {
        let packet = compile_filter("(sn=Miller)").unwrap();
        assert_eq!(
            packet.to_bytes(),
            vec![0xA3, 0x0C, 0x04, 0x02, b's', b'n', 0x04, 0x06, b'M', b'i', b'l', b'l', b'e', b'r']
        );
    }

    #[test]
    fn test_compile_present_bytes() {
        let packet = compile_filter("(member=*)").unwrap();
        assert_eq!(packet.to_bytes(), vec![0x87, 0x06, b'm', b'e', b'm', b'b', b'e', b'r']);
    }

    #[test]
    fn test_compile_substrings_bytes() {
        let packet = compile_filter("(sn=Mi*ll*er)").unwrap();
        assert_eq!(
            packet.to_bytes(),
            vec![
                0xA4, 0x12, 0x04, 0x02, b's', b'n', 0x30, 0x0C, 0x80, 0x02, b'M', b'i', 0x81,
                0x02, b'l', b'l', 0x82, 0x02, b'e', b'r'
            ]
        );
    }

    #[test]
    fn test_compile_and_children() {
        let packet = compile_filter("(&(sn=Miller)(givenName=Bob)(cn=*))").unwrap();
        let tags: Vec<u8> = packet.children.iter().map(|c| c.tag).collect();
        assert_eq!(tags, vec![3, 3, 7]);
        assert_eq!(packet.children[1].children[0].value, b"givenName");
        assert_eq!(packet.children[1].children[1].value, b"Bob");
    }

    #[test]
    fn test_substring_segmentation() {
        let initial = compile_filter("(sn=Mill*)").unwrap();
        assert_eq!(segments(&initial), vec![(SubstringKind::Initial, b"Mill".to_vec())]);

        let last = compile_filter("(sn=*Mill)").unwrap();
        assert_eq!(segments(&last), vec![(SubstringKind::Final, b"Mill".to_vec())]);

        let any = compile_filter("(sn=*Mill*)").unwrap();
        assert_eq!(segments(&any), vec![(SubstringKind::Any, b"Mill".to_vec())]);

        let all = compile_filter("(cn=a*b*c*d)").unwrap();
        assert_eq!(
            segments(&all),
            vec![
                (SubstringKind::Initial, b"a".to_vec()),
                (SubstringKind::Any, b"b".to_vec()),
                (SubstringKind::Any, b"c".to_vec()),
                (SubstringKind::Final, b"d".to_vec()),
            ]
        );
    }

    #[test]
    fn test_presence() {
        let packet = compile_filter("(sn=*)").unwrap();
        assert_eq!(packet.tag, FilterKind::Present.tag());
        assert!(!packet.constructed);
        assert_eq!(packet.value, b"sn");
        assert!(packet.children.is_empty());
    }

    #[test]
    fn test_escaped_values() {
        let packet = compile_filter(r"(cn=a\2ab\28c\29)").unwrap();
        assert_eq!(packet.tag, FilterKind::EqualityMatch.tag());
        assert_eq!(packet.children[1].value, b"a*b(c)");

        let packet = compile_filter(r"(cn=\2a*)").unwrap();
        assert_eq!(segments(&packet), vec![(SubstringKind::Initial, b"*".to_vec())]);
    }

    #[test]
    fn test_empty_value_is_equality() {
        let packet = compile_filter("(sn=)").unwrap();
        assert_eq!(packet.tag, FilterKind::EqualityMatch.tag());
        assert!(packet.children[1].value.is_empty());
    }

    #[test]
    fn test_utf8_value() {
        let packet = compile_filter("(sn=Müller)").unwrap();
        assert_eq!(packet.children[1].value, "Müller".as_bytes());
    }

    #[test]
    fn test_unbalanced() {
        for text in ["(sn=Miller", "(&(sn=Miller)", "(", "(sn", "(sn=a(b)"] {
            assert!(
                matches!(compile_filter(text), Err(ParseError::UnbalancedParens { .. })),
                "{} should be unbalanced",
                text
            );
        }
    }

    #[test]
    fn test_unparenthesized() {
        assert_eq!(
            compile_filter("sn=Miller"),
            Err(ParseError::Unparenthesized {
                fragment: "sn=Miller".to_string()
            })
        );
        assert!(matches!(compile_filter(""), Err(ParseError::Unparenthesized { .. })));
    }

    #[test]
    fn test_empty_filter_list() {
        assert_eq!(
            compile_filter("(&)"),
            Err(ParseError::EmptyFilterList {
                fragment: "(&)".to_string()
            })
        );
        assert!(matches!(compile_filter("(|)"), Err(ParseError::EmptyFilterList { .. })));
    }

    #[test]
    fn test_not_operand_count() {
        assert!(matches!(compile_filter("(!)"), Err(ParseError::MissingOperand { .. })));
        assert!(matches!(
            compile_filter("(!(sn=a)(sn=b))"),
            Err(ParseError::MissingOperand { .. })
        ));
    }

    #[test]
    fn test_unknown_operator() {
        assert_eq!(
            compile_filter("(sn)"),
            Err(ParseError::UnknownOperator {
                fragment: "(sn)".to_string()
            })
        );
        assert!(matches!(compile_filter("()"), Err(ParseError::UnknownOperator { .. })));
        assert!(matches!(compile_filter("(sn~Miller)"), Err(ParseError::UnknownOperator { .. })));
        assert!(matches!(compile_filter("(sn>Miller)"), Err(ParseError::UnknownOperator { .. })));
    }

    #[test]
    fn test_trailing_input() {
        assert_eq!(
            compile_filter("(sn=Miller)(cn=Bob)"),
            Err(ParseError::TrailingInput {
                fragment: "(cn=Bob)".to_string()
            })
        );
        assert!(matches!(compile_filter("(sn=a) "), Err(ParseError::TrailingInput { .. })));
    }

    #[test]
    fn test_malformed_escape() {
        assert_eq!(
            compile_filter(r"(sn=a\zz)"),
            Err(ParseError::MalformedEscape {
                fragment: r"\zz".to_string()
            })
        );
        assert!(matches!(compile_filter(r"(sn=a\)"), Err(ParseError::MalformedEscape { .. })));
        assert!(matches!(compile_filter(r"(sn=a\2"), Err(ParseError::MalformedEscape { .. })));
    }

    #[test]
    fn test_junk_inside_set() {
        assert!(matches!(
            compile_filter("(&(sn=a)x)"),
            Err(ParseError::UnexpectedCharacter { found: 'x', .. })
        ));
    }

    #[test]
    fn test_wildcard_outside_equality() {
        assert!(matches!(
            compile_filter("(sn>=a*)"),
            Err(ParseError::UnexpectedCharacter { found: '*', .. })
        ));
        assert!(compile_filter(r"(sn>=a\2a)").is_ok());
    }

    #[test]
    fn test_raw_control_bytes_rejected() {
        assert_eq!(
            compile_filter("(cn=a\tb)"),
            Err(ParseError::UnexpectedCharacter {
                found: '\t',
                fragment: "(cn=a\tb)".to_string()
            })
        );
        assert!(matches!(
            compile_filter("(cn=*x\ny*)"),
            Err(ParseError::UnexpectedCharacter { found: '\n', .. })
        ));
        assert!(matches!(
            compile_filter("(cn>=\u{7f})"),
            Err(ParseError::UnexpectedCharacter { found: '\u{7f}', .. })
        ));

        let packet = compile_filter(r"(cn=a\09b)").unwrap();
        assert_eq!(packet.children[1].value, b"a\tb");
        assert_eq!(crate::decompile_filter(&packet).unwrap(), r"(cn=a\09b)");
    }

    #[test]
    fn test_empty_attribute_and_substring() {
        assert!(matches!(compile_filter("(=Miller)"), Err(ParseError::EmptyAttribute { .. })));
        assert!(matches!(compile_filter("(sn=a**b)"), Err(ParseError::EmptySubstring { .. })));
        assert!(matches!(compile_filter("(sn=**)"), Err(ParseError::EmptySubstring { .. })));
    }

    #[test]
    fn test_extensible_match_unsupported() {
        for text in ["(cn:caseExactMatch:=Fred)", "(:dn:2.4.6.8.10:=Dino)", "(o:dn:=Ace)"] {
            assert!(
                matches!(
                    compile_filter(text),
                    Err(ParseError::UnsupportedFilterKind {
                        kind: FilterKind::ExtensibleMatch,
                        ..
                    })
                ),
                "{} should be unsupported",
                text
            );
        }
    }

    #[test]
    fn test_depth_limit() {
        let config = FilterConfig::default().with_max_depth(2);
        assert!(compile_filter_with("(!(sn=a))", &config).is_ok());
        assert_eq!(
            compile_filter_with("(!(!(sn=a)))", &config),
            Err(ParseError::DepthExceeded { max_depth: 2 })
        );
    }

    #[test]
    fn test_deep_nesting_without_limit() {
        let depth = 200;
        let text = format!("{}(sn=a){}", "(!".repeat(depth), ")".repeat(depth));
        let mut packet = &compile_filter(&text).unwrap();
        for _ in 0..depth {
            assert_eq!(packet.tag, FilterKind::Not.tag());
            packet = &packet.children[0];
        }
        assert_eq!(packet.tag, FilterKind::EqualityMatch.tag());
    }
}
