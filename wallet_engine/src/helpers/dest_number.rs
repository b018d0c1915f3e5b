//! Destination (recipient) phone numbers for data bundle orders.
use std::sync::OnceLock;

use regex::Regex;

use crate::traits::WalletError;

const COUNTRY_CODE: &str = "233";

fn digits_only() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{9,15}$").unwrap())
}

/// Strips whitespace, dashes, brackets and a leading `+` from a destination number and checks that what remains is a
/// plausible phone number. Empty input is treated as "no destination".
pub fn clean_dest_number(raw: Option<&str>) -> Result<Option<String>, WalletError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(s) => s,
    };
    let cleaned = raw.chars().filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+')).collect::<String>();
    if digits_only().is_match(&cleaned) {
        Ok(Some(cleaned))
    } else {
        Err(WalletError::validation(format!("'{raw}' is not a valid destination number")))
    }
}

/// All the spellings under which a local number may have been stored: `0XXXXXXXXX`, `XXXXXXXXX` and `233XXXXXXXXX`.
pub fn dest_number_variants(number: &str) -> Vec<String> {
    let cleaned = number.chars().filter(char::is_ascii_digit).collect::<String>();
    let mut variants = vec![cleaned.clone()];
    if cleaned.len() == 10 && cleaned.starts_with('0') {
        variants.push(cleaned[1..].to_string());
        variants.push(format!("{COUNTRY_CODE}{}", &cleaned[1..]));
    } else if cleaned.len() == 12 && cleaned.starts_with(COUNTRY_CODE) {
        variants.push(format!("0{}", &cleaned[3..]));
        variants.push(cleaned[3..].to_string());
    } else if cleaned.len() == 9 {
        variants.push(format!("0{cleaned}"));
        variants.push(format!("{COUNTRY_CODE}{cleaned}"));
    }
    variants
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cleaning() {
        assert_eq!(clean_dest_number(None).unwrap(), None);
        assert_eq!(clean_dest_number(Some("  ")).unwrap(), None);
        assert_eq!(clean_dest_number(Some("024 412-3456")).unwrap(), Some("0244123456".into()));
        assert_eq!(clean_dest_number(Some("+233244123456")).unwrap(), Some("233244123456".into()));
        let err = clean_dest_number(Some("call me")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input. 'call me' is not a valid destination number");
        assert!(clean_dest_number(Some("12345")).is_err());
    }

    #[test]
    fn variants() {
        let expected = vec!["0244123456", "244123456", "233244123456"];
        assert_eq!(dest_number_variants("0244123456"), expected);
        let mut v = dest_number_variants("233244123456");
        v.sort();
        let mut e = expected.clone();
        e.sort();
        assert_eq!(v, e);
        let mut v = dest_number_variants("244123456");
        v.sort();
        assert_eq!(v, e);
        assert_eq!(dest_number_variants("12345"), vec!["12345"]);
    }
}
