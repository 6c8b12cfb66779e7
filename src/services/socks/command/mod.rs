//! SOCKS5 request decoding and reply encoding

mod parser;
mod reply;

pub use parser::{read_request, RequestError};
pub use reply::{encode_reply, reply_code_for, send_reply};
