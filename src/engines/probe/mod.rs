pub mod generator;
pub mod request;
pub mod filter;
pub mod fetcher;

pub use generator::{generate_piece, CharClass, ProbeGenerator, ProbeTemplate};
pub use request::{RawRequest, RequestMethod};
pub use filter::KeywordFilter;
pub use fetcher::{Fetcher, HttpFetcher};
