mod executor;
mod pagination;
mod query;
mod transport;

pub use executor::{ApiBase, ApiCall, ApiExecutor, AuthScheme, TokenKind};
pub use pagination::{GoogleListPage, HelixPage, PagedResponse, PaginationCursor};
pub use query::{QueryParams, QueryValue};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, RequestBody, ReqwestTransport};

pub(crate) use transport::DEFAULT_UA;

#[cfg(test)]
pub(crate) use transport::stub;
