//! The framed `smtpd_access_policy` wire protocol: attribute parsing,
//! response formatting, and version classification. Deliberately has no
//! knowledge of sockets or buffering; that lives in `policyd`'s
//! connection server, which owns framing the byte stream into blocks
//! and hands each block here.

mod frame;
mod version;

pub use frame::{
    format_response, invalid_request_response, is_valid, parse_attributes, FRAME_TERMINATOR,
    INVALID_REQUEST_RESPONSE,
};
pub use version::probe_version;
