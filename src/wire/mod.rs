//! Wire protocol: query grammar, directive tokenizing, dump formatting,
//! response framing, value-format validation, and the banner line.

pub mod banner;
pub mod directive;
pub mod dump;
pub mod format;
pub mod query;
pub mod response;

pub use query::{ParseOptions, Query, QueryError};
pub use response::{ErrorCode, ResponseLine};

impl From<QueryError> for ErrorCode {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Syntax => ErrorCode::InvalidQuerySyntax,
            QueryError::WildcardDisallowed => ErrorCode::InvalidQuerySyntax,
            QueryError::SubstringDisallowed => ErrorCode::InvalidQuerySyntax,
            QueryError::TooComplex => ErrorCode::QueryTooComplex,
        }
    }
}
