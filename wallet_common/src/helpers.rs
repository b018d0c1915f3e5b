/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse a numeric setting, falling back to `default` when the value is missing or malformed.
///
/// The error, if any, is returned alongside the default so that callers can log it in their own voice.
pub fn parse_numeric_setting<T: std::str::FromStr>(value: Option<String>, default: T) -> (T, Option<String>)
where T::Err: std::fmt::Display {
    match value {
        None => (default, None),
        Some(s) => match s.trim().parse::<T>() {
            Ok(v) => (v, None),
            Err(e) => (default, Some(format!("'{s}' is not a valid value. {e}"))),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("Yes".into()), false));
        assert!(!parse_boolean_flag(Some(" off ".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn numeric_settings() {
        assert_eq!(parse_numeric_setting::<u32>(Some("25".into()), 5), (25, None));
        assert_eq!(parse_numeric_setting::<u32>(None, 5), (5, None));
        let (v, err) = parse_numeric_setting::<u16>(Some("eighty".into()), 8370);
        assert_eq!(v, 8370);
        assert!(err.unwrap().starts_with("'eighty' is not a valid value."));
    }
}
