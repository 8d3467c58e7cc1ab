//! Build identity.

use std::ffi::CStr;

use serde::Serialize;

const fn parse_component(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut value = 0;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u32;
        i += 1;
    }
    value
}

pub const MAJOR: u32 = parse_component(env!("CARGO_PKG_VERSION_MAJOR"));
pub const MINOR: u32 = parse_component(env!("CARGO_PKG_VERSION_MINOR"));
pub const PATCH: u32 = parse_component(env!("CARGO_PKG_VERSION_PATCH"));

// NUL-terminated originals; the `&str` views are derived from them.
pub(crate) const VERSION_C: &CStr = nul_terminated(concat!(
    "v",
    env!("CARGO_PKG_VERSION_MAJOR"),
    ".",
    env!("CARGO_PKG_VERSION_MINOR"),
    ".",
    env!("CARGO_PKG_VERSION_PATCH"),
    "\0"
));
pub(crate) const COMMIT_ID_C: &CStr = nul_terminated(concat!(env!("RADIOHOST_COMMIT"), "\0"));

pub const COMMIT_ID: &str = text(COMMIT_ID_C);
const VERSION: &str = text(VERSION_C);

const fn nul_terminated(s: &'static str) -> &'static CStr {
    match CStr::from_bytes_with_nul(s.as_bytes()) {
        Ok(c) => c,
        Err(_) => panic!("build identity contains an interior NUL"),
    }
}

const fn text(c: &'static CStr) -> &'static str {
    match std::str::from_utf8(c.to_bytes()) {
        Ok(s) => s,
        Err(_) => panic!("build identity is not UTF-8"),
    }
}

/// Version descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub commit_id: &'static str,
}

static VERSION_INFO: VersionInfo = VersionInfo {
    major: MAJOR,
    minor: MINOR,
    patch: PATCH,
    commit_id: COMMIT_ID,
};

/// `"v{major}.{minor}.{patch}"`.
pub fn version() -> &'static str {
    VERSION
}

/// `major * 10000 + minor * 100 + patch`.
pub fn version_number() -> u32 {
    MAJOR * 10000 + MINOR * 100 + PATCH
}

pub fn version_info() -> &'static VersionInfo {
    &VERSION_INFO
}
