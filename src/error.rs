//! Core error type shared across the indexing pipeline and ranker.

use thiserror::Error;

/// Errors produced by the crawler, text pipeline, storage layer, and ranker.
#[derive(Error, Debug)]
pub enum Error {
    /// Normalization or tokenization rejected the input; indexing of the
    /// page aborts without persisting partial output.
    #[error("text pipeline error: {0}")]
    Text(String),

    /// HTTP error or timeout while fetching a page. The message is dropped,
    /// no retry is scheduled.
    #[error("fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The `Location` header on a response pointed back at the request URL.
    #[error("redirect loop detected")]
    RedirectLoop,

    /// A redirect was found but following it would exceed the crawl's max depth.
    #[error("max depth reached")]
    MaxDepthReached,

    /// A redirect was found and its target was enqueued for later crawling.
    #[error("redirect found")]
    Redirect,

    /// A storage transaction failed and was rolled back.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A search matched no indexed page.
    #[error("no results found")]
    NotFound,

    /// The ambient cancellation token fired.
    #[error("cancelled")]
    Cancelled,

    /// A URL failed to parse.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Convenience alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
