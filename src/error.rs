use thiserror::Error;

use crate::filters::FilterError;

/// Template errors. Any of these aborts generation of the current document.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Foreach is incorrectly placed: '{marker}' has no enclosing block")]
    MisplacedLoop { marker: String },

    #[error("Ending foreach tag not found for '{collection}'")]
    UnclosedLoop { collection: String },

    #[error("There is no such filter '{0}'")]
    UnknownFilter(String),

    #[error("Malformed tag '{{{tag}}}': {reason}")]
    MalformedTag { tag: String, reason: String },

    #[error("Filter '{filter}' failed: {source}")]
    Filter {
        filter: String,
        #[source]
        source: FilterError,
    },
}
