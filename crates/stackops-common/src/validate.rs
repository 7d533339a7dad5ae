//! Input validation for stack names and regions
//!
//! Stack names end up in resource names and tags at the provider, so they
//! are restricted to a conservative character set.

use thiserror::Error;

/// Shortest accepted stack name
pub const MIN_STACK_NAME_LEN: usize = 2;

/// Longest accepted stack name
pub const MAX_STACK_NAME_LEN: usize = 64;

/// Region area prefixes the engine knows how to address
const REGION_AREAS: &[&str] = &["us", "eu", "ap", "ca", "sa", "me", "af"];

/// Region directions (`us-east-1`, `ap-northeast-2`, ...)
const REGION_DIRECTIONS: &[&str] = &[
    "east",
    "west",
    "north",
    "south",
    "central",
    "northeast",
    "northwest",
    "southeast",
    "southwest",
];

/// Rejected user input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("stack name must not be empty")]
    EmptyStackName,

    #[error(
        "stack name '{name}' must be between {} and {} characters",
        MIN_STACK_NAME_LEN,
        MAX_STACK_NAME_LEN
    )]
    StackNameLength { name: String },

    #[error("stack name '{name}' may only contain lowercase letters, digits and hyphens, and must not start with a hyphen")]
    StackNameCharacters { name: String },

    #[error("invalid region '{region}' (expected e.g. us-east-1)")]
    InvalidRegion { region: String },
}

/// Validate a stack name.
///
/// ```
/// use stackops_common::validate::validate_stack_name;
///
/// assert!(validate_stack_name("web-prod-1").is_ok());
/// assert!(validate_stack_name("Web_Prod").is_err());
/// ```
pub fn validate_stack_name(name: &str) -> Result<(), InputError> {
    if name.is_empty() {
        return Err(InputError::EmptyStackName);
    }
    if !(MIN_STACK_NAME_LEN..=MAX_STACK_NAME_LEN).contains(&name.len()) {
        return Err(InputError::StackNameLength {
            name: name.to_string(),
        });
    }
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars || name.starts_with('-') {
        return Err(InputError::StackNameCharacters {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Validate a region identifier of the form `<area>-<direction>-<n>`.
pub fn validate_region(region: &str) -> Result<(), InputError> {
    let invalid = || InputError::InvalidRegion {
        region: region.to_string(),
    };

    let mut parts = region.split('-');
    let (Some(area), Some(direction), Some(number), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    if !REGION_AREAS.contains(&area) || !REGION_DIRECTIONS.contains(&direction) {
        return Err(invalid());
    }
    match number.parse::<u8>() {
        Ok(n) if (1..=9).contains(&n) && number.len() == 1 => Ok(()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_stack_names() {
        let longest = "a".repeat(MAX_STACK_NAME_LEN);
        for name in ["ab", "web-prod", "stack-01", "a1", longest.as_str()] {
            assert!(validate_stack_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_stack_names() {
        assert_eq!(validate_stack_name(""), Err(InputError::EmptyStackName));
        let too_long = "a".repeat(MAX_STACK_NAME_LEN + 1);
        for name in ["x", "has_underscore", "has space", "UPPER", "-leading", too_long.as_str()] {
            assert!(validate_stack_name(name).is_err(), "{name} should be invalid");
        }
    }

    #[test]
    fn test_valid_regions() {
        for region in [
            "us-east-1",
            "us-west-2",
            "eu-west-1",
            "eu-central-1",
            "ap-northeast-1",
            "ap-southeast-1",
        ] {
            assert!(validate_region(region).is_ok(), "{region} should be valid");
        }
    }

    #[test]
    fn test_invalid_regions() {
        for region in ["", "invalid-region", "us-invalid-1", "us-east", "us-east-10", "us-east-1-x"] {
            assert!(validate_region(region).is_err(), "{region} should be invalid");
        }
    }

    proptest! {
        #[test]
        fn prop_generated_names_are_valid(name in "[a-z0-9][a-z0-9-]{1,63}") {
            prop_assert!(validate_stack_name(&name).is_ok());
        }

        #[test]
        fn prop_uppercase_is_rejected(prefix in "[a-z]{1,10}", upper in "[A-Z]") {
            let name = format!("{prefix}{upper}");
            prop_assert!(validate_stack_name(&name).is_err());
        }
    }
}
