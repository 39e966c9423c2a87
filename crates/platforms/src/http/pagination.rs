use serde::Deserialize;

/// Sentinel Twitch sends as the cursor of some final pages.
const EXHAUSTED_CURSOR: &str = "IA";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaginationCursor {
    #[serde(default)]
    pub cursor: Option<String>,
}

impl PaginationCursor {
    pub fn new(cursor: Option<String>) -> Self {
        Self { cursor }
    }

    /// A cursor is usable iff it is present, non-empty and not the sentinel.
    pub fn is_valid(&self) -> bool {
        self.cursor
            .as_deref()
            .is_some_and(|c| !c.is_empty() && c != EXHAUSTED_CURSOR)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|_| self.is_valid())
    }
}

/// One page of a cursor-paginated list endpoint.
pub trait PagedResponse {
    type Item;

    /// Query parameter the next page's cursor is sent in.
    const CURSOR_PARAM: &'static str = "after";

    fn into_parts(self) -> (Vec<Self::Item>, PaginationCursor);
}

/// Helix list envelope: `{"data": [...], "pagination": {"cursor": "..."}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct HelixPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: PaginationCursor,
}

impl<T> PagedResponse for HelixPage<T> {
    type Item = T;

    fn into_parts(self) -> (Vec<T>, PaginationCursor) {
        (self.data, self.pagination)
    }
}

/// Google Data API list envelope: `{"items": [...], "nextPageToken": "..."}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleListPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl<T> PagedResponse for GoogleListPage<T> {
    type Item = T;
    const CURSOR_PARAM: &'static str = "pageToken";

    fn into_parts(self) -> (Vec<T>, PaginationCursor) {
        (self.items, PaginationCursor::new(self.next_page_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_validity() {
        assert!(!PaginationCursor::new(None).is_valid());
        assert!(!PaginationCursor::new(Some("IA".into())).is_valid());
        assert!(!PaginationCursor::new(Some(String::new())).is_valid());
        assert!(PaginationCursor::new(Some("eyJiIjpudWxsfQ".into())).is_valid());
    }

    #[test]
    fn helix_page_without_pagination_is_final() {
        let page: HelixPage<u32> = serde_json::from_str(r#"{"data":[1,2]}"#).unwrap();
        let (items, cursor) = page.into_parts();
        assert_eq!(items, vec![1, 2]);
        assert!(!cursor.is_valid());
    }

    #[test]
    fn google_page_uses_page_token() {
        let page: GoogleListPage<u32> =
            serde_json::from_str(r#"{"items":[7],"nextPageToken":"CAUQAA"}"#).unwrap();
        let (items, cursor) = page.into_parts();
        assert_eq!(items, vec![7]);
        assert_eq!(cursor.as_str(), Some("CAUQAA"));
        assert_eq!(<GoogleListPage<u32> as PagedResponse>::CURSOR_PARAM, "pageToken");
    }
}
