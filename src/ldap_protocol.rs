// LDAP SearchRequest envelope carrying a real Filter
// Implements the LDAPMessage / SearchRequest framing of RFC 4511 section 4.5.1

use crate::ber::{BerReader, BerWriter};
use crate::compiler::compile_filter;
use crate::config::FilterConfig;
use crate::decompiler::decompile_filter_with;
use anyhow::{bail, Context, Result};
use tracing::debug;

pub const LDAP_TAG_SEARCH_REQUEST: u8 = 0x63;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_object: String,
    pub scope: SearchScope,
    pub deref_aliases: i32,
    pub size_limit: i32,
    pub time_limit: i32,
    pub types_only: bool,
    /// RFC 4515 text; compiled on encode and decompiled on parse.
    pub filter: String,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    BaseObject = 0,
    SingleLevel = 1,
    WholeSubtree = 2,
}

impl TryFrom<u8> for SearchScope {
    type Error = anyhow::Error;
    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SearchScope::BaseObject),
            1 => Ok(SearchScope::SingleLevel),
            2 => Ok(SearchScope::WholeSubtree),
            _ => bail!("Invalid search scope: {}", value),
        }
    }
}

/// Encode `LDAPMessage ::= SEQUENCE { messageID, searchRequest [APPLICATION 3] }`.
pub fn encode_search_request(message_id: i32, request: &SearchRequest) -> Result<Vec<u8>> {
    let filter = compile_filter(&request.filter)
        .with_context(|| format!("Invalid search filter {:?}", request.filter))?;
    // derefAliases ENUMERATED { neverDerefAliases (0) .. derefAlways (3) }
    let deref_aliases = match u8::try_from(request.deref_aliases) {
        Ok(value @ 0..=3) => value,
        _ => bail!("Invalid deref aliases: {}", request.deref_aliases),
    };

    let mut writer = BerWriter::new();
    let seq_start = writer.start_sequence();
    writer.write_integer(message_id);

    let op_start = writer.start_constructed(LDAP_TAG_SEARCH_REQUEST);
    writer.write_string(&request.base_object);
    writer.write_enumerated(request.scope as u8);
    writer.write_enumerated(deref_aliases);
    writer.write_integer(request.size_limit);
    writer.write_integer(request.time_limit);
    writer.write_boolean(request.types_only);
    writer.write_packet(&filter);

    let attrs_start = writer.start_sequence();
    for attr in &request.attributes {
        writer.write_string(attr);
    }
    writer.end_sequence(attrs_start);

    writer.end_constructed(op_start);
    writer.end_sequence(seq_start);

    debug!("Encoded SEARCH request {}: filter={}", message_id, request.filter);
    Ok(writer.into_vec())
}

/// Parse an LDAPMessage that must hold a SearchRequest. Returns (message_id, request).
pub fn parse_search_request_message(data: &[u8]) -> Result<(i32, SearchRequest)> {
    parse_search_request_message_with(data, &FilterConfig::default())
}

/// Like `parse_search_request_message`, decoding the filter under `config`.
pub fn parse_search_request_message_with(
    data: &[u8],
    config: &FilterConfig,
) -> Result<(i32, SearchRequest)> {
    let mut reader = BerReader::new(data);
    let _seq_len = reader.read_sequence()?;
    let message_id = reader.read_integer()?;

    let tag = reader.read_tag()?;
    if tag != LDAP_TAG_SEARCH_REQUEST {
        bail!("Expected SearchRequest tag (0x63), got: 0x{:02X}", tag);
    }
    let request = parse_search_request(&mut reader, config)?;
    debug!("Parsed SEARCH request {}: base={}, filter={}", message_id, request.base_object, request.filter);
    Ok((message_id, request))
}

fn parse_search_request(reader: &mut BerReader, config: &FilterConfig) -> Result<SearchRequest> {
    let _len = reader.read_length()?;
    let base_object = reader.read_string()?;
    let scope = SearchScope::try_from(reader.read_enumerated()?)?;
    let deref_aliases = reader.read_enumerated()? as i32;
    let size_limit = reader.read_integer()?;
    let time_limit = reader.read_integer()?;
    let types_only = reader.read_boolean()?;

    let filter_packet = reader
        .read_packet_within(config.decode_depth())
        .context("Failed to read search filter")?;
    let filter = decompile_filter_with(&filter_packet, config)
        .context("Failed to decompile search filter")?;

    // AttributeSelection ::= SEQUENCE OF selector LDAPString
    let attrs_len = reader.read_sequence()?;
    let attrs_end = reader.position() + attrs_len;
    let mut attributes = Vec::new();
    while reader.position() < attrs_end {
        attributes.push(reader.read_string()?);
    }

    Ok(SearchRequest {
        base_object,
        scope,
        deref_aliases,
        size_limit,
        time_limit,
        types_only,
        filter,
        attributes,
    })
}

// Helper function to convert ldap3::Scope to our SearchScope
pub fn scope_from_ldap3(scope: ldap3::Scope) -> SearchScope {
    match scope {
        ldap3::Scope::Base => SearchScope::BaseObject,
        ldap3::Scope::OneLevel => SearchScope::SingleLevel,
        ldap3::Scope::Subtree => SearchScope::WholeSubtree,
    }
}

pub fn scope_to_ldap3(scope: SearchScope) -> ldap3::Scope {
    match scope {
        SearchScope::BaseObject => ldap3::Scope::Base,
        SearchScope::SingleLevel => ldap3::Scope::OneLevel,
        SearchScope::WholeSubtree => ldap3::Scope::Subtree,
    }
}
