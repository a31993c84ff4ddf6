//! Configuration through environment variables.

/// Interpret a string value such as "1" or "no" as a boolean.
pub fn str_as_bool(s: &str) -> bool {
    match s {
        "1" | "true" | "t" | "yes" | "y" => true,
        "0" | "false" | "f" | "no" | "n" => false,
        _ => {
            log::warn!("Unrecognized boolean value \"{}\"", s);
            false
        }
    }
}

/// Return whether a feature flag controlled by an environment variable is
/// enabled.
pub fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .as_ref()
        .map(|s| str_as_bool(s))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use neutral_testing::TestCases;

    use super::{env_flag, str_as_bool};

    #[test]
    fn test_str_as_bool() {
        let cases = [
            ("1", true),
            ("yes", true),
            ("t", true),
            ("0", false),
            ("no", false),
            ("maybe", false),
        ];
        cases.test_each(|&(value, expected)| {
            assert_eq!(str_as_bool(value), expected);
        });
    }

    #[test]
    fn test_env_flag_default() {
        assert!(env_flag("NEUTRAL_CODEGEN_TEST_UNSET_FLAG", true));
        assert!(!env_flag("NEUTRAL_CODEGEN_TEST_UNSET_FLAG", false));
    }
}
