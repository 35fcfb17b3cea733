pub mod ber;
pub mod compiler;
pub mod config;
pub mod decompiler;
pub mod error;
pub mod escape;
pub mod filter_kind;
pub mod ldap_protocol;

pub use ber::{Class, Packet};
pub use compiler::{compile_filter, compile_filter_with, compile_to_bytes};
pub use config::FilterConfig;
pub use decompiler::{decompile_bytes, decompile_bytes_with, decompile_filter, decompile_filter_with};
pub use error::{BerError, DecodeError, Error, ParseError};
pub use filter_kind::{FilterKind, SubstringKind};
