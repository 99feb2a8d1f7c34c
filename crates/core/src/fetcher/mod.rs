//! Downloads release archives and unpacks them into the working copy.

mod error;
mod release_fetcher;

pub use error::FetchError;
pub use release_fetcher::{ExtractedRelease, FetchedRelease, ReleaseFetcher};
