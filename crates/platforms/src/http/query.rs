//! Query-string construction from an ordered key/value mapping.
//!
//! Absent values are dropped, list values expand to repeated `key=value`
//! pairs, and insertion order is preserved.

use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Absent,
    One(String),
    Many(Vec<String>),
}

impl<T: ToString> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => QueryValue::One(v.to_string()),
            None => QueryValue::Absent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, QueryValue)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    pub fn with_opt<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.push_opt(key, value);
        self
    }

    pub fn with_all<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.push_all(key, values);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.entries
            .push((key.into(), QueryValue::One(value.to_string())));
    }

    pub fn push_opt<V: ToString>(&mut self, key: impl Into<String>, value: Option<V>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn push_all<I, V>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.entries.push((key.into(), QueryValue::Many(values)));
    }

    /// Replaces every entry for `key`, keeping the position of the first one.
    pub fn set(&mut self, key: &str, value: QueryValue) {
        match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => {
                self.entries[index].1 = value;
                let mut seen = 0;
                self.entries.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs().next().is_none()
    }

    /// Flattened `(key, value)` pairs, absent entries dropped.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(key, value)| {
            let values: Vec<&str> = match value {
                QueryValue::Absent => Vec::new(),
                QueryValue::One(v) => vec![v.as_str()],
                QueryValue::Many(vs) => vs.iter().map(String::as_str).collect(),
            };
            values.into_iter().map(move |v| (key.as_str(), v))
        })
    }

    /// `&`-joined, percent-encoded query string without a leading `?`.
    pub fn to_query_string(&self) -> String {
        self.pairs()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Appends this query to `url`, choosing `?` or `&` as needed.
    pub fn append_to(&self, url: &str) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            return url.to_string();
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}{query}")
    }
}

fn encode(raw: &str) -> Cow<'_, str> {
    urlencoding::encode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_absent_and_expands_lists_in_order() {
        let query = QueryParams::new()
            .with("a", 1)
            .with_opt("b", None::<i32>)
            .with_all("c", [1, 2]);
        assert_eq!(query.to_query_string(), "a=1&c=1&c=2");
    }

    #[test]
    fn encodes_reserved_characters() {
        let query = QueryParams::new().with("q", "https://x/y?a=b&c");
        assert_eq!(query.to_query_string(), "q=https%3A%2F%2Fx%2Fy%3Fa%3Db%26c");
    }

    #[test]
    fn set_replaces_in_place() {
        let mut query = QueryParams::new()
            .with("first", 100)
            .with("after", "x")
            .with("last", true);
        query.set("after", QueryValue::One("y".into()));
        assert_eq!(query.to_query_string(), "first=100&after=y&last=true");

        query.set("after", QueryValue::Absent);
        assert_eq!(query.to_query_string(), "first=100&last=true");
    }

    #[test]
    fn set_appends_missing_keys() {
        let mut query = QueryParams::new().with("id", 1);
        query.set("after", QueryValue::One("abc".into()));
        assert_eq!(query.to_query_string(), "id=1&after=abc");
    }

    #[test]
    fn append_to_picks_separator() {
        let query = QueryParams::new().with("x", 1);
        assert_eq!(query.append_to("https://a/b"), "https://a/b?x=1");
        assert_eq!(query.append_to("https://a/b?y=2"), "https://a/b?y=2&x=1");
        assert_eq!(QueryParams::new().append_to("https://a/b"), "https://a/b");
    }

    #[test]
    fn empty_when_everything_absent() {
        let query = QueryParams::new().with_opt("a", None::<&str>).with_all("b", Vec::<u8>::new());
        assert!(query.is_empty());
        assert_eq!(query.to_query_string(), "");
    }
}
