use thiserror::Error;

#[derive(Error, Debug)]
pub enum BumplineError {
    #[error("transformer error: {0}")]
    Transform(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("git command failed: {command}\nstderr: {stderr}")]
    Git { command: String, stderr: String },

    #[error("working directory {0} has uncommitted changes, refusing to checkout without force")]
    DirtyWorkingTree(String),

    #[error("{kind} parameter(s) required: [{params}]")]
    MissingParameters { kind: String, params: String },

    #[error("target has no change message")]
    NoChangeMessage,

    #[error("no changed file to commit")]
    NoChangedFiles,

    #[error("empty commit message")]
    EmptyCommitMessage,

    #[error("automerge is not allowed on repository")]
    AutoMergeNotAllowed,

    #[error("wrong merge method defined, accepting one of 'squash', 'merge', 'rebase', or ''")]
    BadMergeMethod,

    #[error("API rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("GitHub API rate limit exceeded, final attempt failed")]
    RateLimitFinalAttempt,

    #[error("none of the requested reviewers could be resolved: {0}")]
    UnresolvedReviewers(String),

    #[error("something went wrong, found {found}, expected {expected}")]
    PaginationMismatch { found: usize, expected: usize },

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("GraphQL errors in {operation}: {errors}")]
    GraphQL { operation: String, errors: String },

    #[error("GraphQL response contained no data")]
    NoResponseData,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
}

impl BumplineError {
    /// Whether the error carries the host's rate-limit signature.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, BumplineError::RateLimited(_))
    }
}

pub type Result<T> = std::result::Result<T, BumplineError>;
