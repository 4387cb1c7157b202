use std::env;
use std::str::FromStr;

/// Read an environment variable, treating unset and blank values alike
pub fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// First non-blank value among `names`, in order
pub fn first_env_value(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| env_value(name))
}

/// Parse the first non-blank value among `names`
pub fn parse_env<T>(names: &[&str]) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    for name in names {
        if let Some(raw) = env_value(name) {
            return raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| format!("Invalid {name} environment variable: {e}"));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn cleanup() {
        unsafe {
            env::remove_var("VB_TEST_A");
            env::remove_var("VB_TEST_B");
        }
    }

    #[test]
    #[serial]
    fn test_env_value_ignores_blank() {
        cleanup();
        unsafe {
            env::set_var("VB_TEST_A", "   ");
        }
        assert_eq!(env_value("VB_TEST_A"), None);
        assert_eq!(env_value("VB_TEST_B"), None);
        cleanup();
    }

    #[test]
    #[serial]
    fn test_first_env_value_order() {
        cleanup();
        unsafe {
            env::set_var("VB_TEST_B", "second");
        }
        assert_eq!(
            first_env_value(&["VB_TEST_A", "VB_TEST_B"]).as_deref(),
            Some("second")
        );
        unsafe {
            env::set_var("VB_TEST_A", "first");
        }
        assert_eq!(
            first_env_value(&["VB_TEST_A", "VB_TEST_B"]).as_deref(),
            Some("first")
        );
        cleanup();
    }

    #[test]
    #[serial]
    fn test_parse_env() {
        cleanup();
        assert_eq!(parse_env::<u16>(&["VB_TEST_A"]).unwrap(), None);

        unsafe {
            env::set_var("VB_TEST_A", "8080");
        }
        assert_eq!(parse_env::<u16>(&["VB_TEST_A"]).unwrap(), Some(8080));

        unsafe {
            env::set_var("VB_TEST_A", "not-a-number");
        }
        let err = parse_env::<u16>(&["VB_TEST_A"]).unwrap_err();
        assert!(err.contains("Invalid VB_TEST_A"));
        cleanup();
    }
}
