use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("request to {url} failed with status {status}: {body}")]
    Http { url: String, status: u16, body: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("failed to decode JSON from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("failed to fetch {url} after {attempts} attempts: {last}")]
    Exhausted { url: String, attempts: u32, last: Box<FetchError> },

    #[error("all endpoints failed, last error: {last}")]
    AllEndpointsFailed { last: Box<FetchError> },

    #[error("no endpoints configured")]
    NoEndpoints,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid location data received: country={country:?}, city={city:?}")]
    InvalidLocationData { country: String, city: String },

    #[error("invalid response from prayer times API: {0}")]
    InvalidApiResponse(String),
}
