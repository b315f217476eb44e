//! Various utilities functions and types

mod handle;

pub use self::handle::{BufferHandle, DisplayHandle, ManagerHandle, ObjectHandle, ShapeDeviceHandle};

/// Parses a boolean-ish environment value
///
/// `1`, `true`, `yes` and `y` are true, case-insensitively. Anything else, including an unset
/// variable, is false.
pub fn env_flag(value: Option<&str>) -> bool {
    value
        .map(|x| {
            x == "1" || x.to_lowercase() == "true" || x.to_lowercase() == "yes" || x.to_lowercase() == "y"
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::env_flag;

    #[test]
    fn env_flag_values() {
        assert!(env_flag(Some("1")));
        assert!(env_flag(Some("TRUE")));
        assert!(env_flag(Some("Yes")));
        assert!(env_flag(Some("y")));
        assert!(!env_flag(Some("0")));
        assert!(!env_flag(Some("")));
        assert!(!env_flag(None));
    }
}
