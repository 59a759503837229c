//! Error types for the device property explorer
//!
//! Most failures in this crate are recoverable by design of the registry
//! protocol: a session that cannot be opened yields no devices, a key that
//! cannot be decoded is left out of its bag. These types carry the reason
//! far enough to be logged, and are only surfaced to callers for the few
//! operations that can genuinely fail (constructors, configuration).

use thiserror::Error;

/// Errors reported by a device registry backend
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The requested property or entry does not exist
    #[error("Element not found")]
    NotFound,

    /// The supplied buffer was too small for the value
    #[error("Insufficient buffer")]
    InsufficientBuffer,

    /// A registry call failed with a platform error code
    #[error("{call} failed with error {code}")]
    Api { call: &'static str, code: u32 },

    /// The enumeration session could not be opened
    #[error("Device registry session unavailable: {0}")]
    SessionUnavailable(String),

    /// The device registry is not available on this platform
    #[error("The device registry is only available on Windows")]
    Unsupported,
}

/// Errors produced while turning a raw property buffer into a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The wire type tag is not part of the known tag set
    #[error("Unsupported property type 0x{0:08X}")]
    UnsupportedType(u32),

    /// The buffer is shorter than the type requires
    #[error("Buffer too short: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// A tick count does not map onto a calendar instant
    #[error("Timestamp out of range: {0}")]
    InvalidTimestamp(i64),

    /// A binary security descriptor could not be parsed
    #[error("Invalid security descriptor: {0}")]
    InvalidSecurityDescriptor(String),
}

/// Contract violations when building model objects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A device interface needs a non-empty path
    #[error("Device interface path must not be empty")]
    EmptyInterfacePath,
}

/// Errors reading an executable image
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Missing `MZ` or `PE\0\0` signature
    #[error("Not a PE image: {0}")]
    NotPe(&'static str),

    /// A header or table runs past the end of the file
    #[error("Image truncated at offset 0x{0:X}")]
    Truncated(usize),

    /// Optional header magic is neither PE32 nor PE32+
    #[error("Unsupported optional header magic 0x{0:04X}")]
    UnsupportedMagic(u16),
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RegistryError::Api {
            call: "SetupDiEnumDeviceInfo",
            code: 259,
        };
        assert_eq!(err.to_string(), "SetupDiEnumDeviceInfo failed with error 259");

        let err = DecodeError::UnsupportedType(0x1234);
        assert_eq!(err.to_string(), "Unsupported property type 0x00001234");

        let err = ImageError::UnsupportedMagic(0x107);
        assert_eq!(err.to_string(), "Unsupported optional header magic 0x0107");
    }
}
