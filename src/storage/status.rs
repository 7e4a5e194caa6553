//! Status codes carried by operation responses.
//!
//! Values follow HTTP so every backend reports outcomes the same way.

pub const OK: u16 = 200;
pub const BAD_REQUEST: u16 = 400;
pub const FORBIDDEN: u16 = 403;
pub const NOT_FOUND: u16 = 404;
pub const PAYLOAD_TOO_LARGE: u16 = 413;

/// Unsupported operations and internal failures.
pub const INTERNAL: u16 = 500;

pub fn is_success(code: u16) -> bool {
    (200..300).contains(&code)
}
