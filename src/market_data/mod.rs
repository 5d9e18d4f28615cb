pub mod fetcher;
pub mod yahoo;

pub use fetcher::PriceFetcher;
pub use yahoo::YahooClient;
