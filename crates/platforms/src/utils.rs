use regex::Regex;
use serde_json::Value;

use crate::error::{ResolverError, Result};

#[inline]
pub fn capture_group_1<'a>(re: &Regex, input: &'a str) -> Option<&'a str> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[inline]
pub fn capture_group_1_or_scrape_error<'a>(
    re: &Regex,
    input: &'a str,
    what: &str,
) -> Result<&'a str> {
    capture_group_1(re, input).ok_or_else(|| ResolverError::Scrape(format!("{what} not found")))
}

#[inline]
pub fn json_get_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

/// Reads a numeric field that some APIs send as a string.
#[inline]
pub fn json_get_u64(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(|v| {
        if let Some(n) = v.as_u64() {
            Some(n)
        } else if let Some(s) = v.as_str() {
            s.parse::<u64>().ok()
        } else {
            None
        }
    })
}

/// Decodes a JSON body into `T`, tagging schema mismatches with the target name.
pub fn decode_json<T: serde::de::DeserializeOwned>(body: &[u8], target: &'static str) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| ResolverError::decode(target, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_numbers_sent_as_strings() {
        let v = serde_json::json!({ "a": 5, "b": "7", "c": "x" });
        assert_eq!(json_get_u64(&v, "a"), Some(5));
        assert_eq!(json_get_u64(&v, "b"), Some(7));
        assert_eq!(json_get_u64(&v, "c"), None);
        assert_eq!(json_get_u64(&v, "missing"), None);
    }

    #[test]
    fn decode_json_names_target() {
        let err = decode_json::<Vec<u32>>(b"{}", "numbers").unwrap_err();
        assert!(matches!(err, ResolverError::Decode { target: "numbers", .. }));
    }
}
