use thiserror::Error;

/// Why an LLM response could not be read as an edit set.
///
/// Every variant carries a short excerpt of the offending response for logs
/// and for the retry prompt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("no diff blocks found in response: {excerpt}")]
    NoDiffBlocks { excerpt: String },

    #[error("diff block {index} is missing {marker:?}: {excerpt}")]
    MissingMarker {
        index: usize,
        marker: &'static str,
        excerpt: String,
    },

    #[error("invalid JSON: {message}: {excerpt}")]
    InvalidJson { message: String, excerpt: String },

    #[error("no search/replace blocks found in response: {excerpt}")]
    NoBlocks { excerpt: String },

    #[error("block {index} is missing field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("block {index} field '{field}' is not a string")]
    NonStringField { index: usize, field: &'static str },

    #[error("block {index} has an empty search string")]
    EmptySearch { index: usize },

    #[error("empty block list although a change was described: {explanation}")]
    EmptyBlockList { explanation: String },
}
