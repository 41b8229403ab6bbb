pub mod cache;
pub mod market;
pub mod news;
pub mod traits;
pub mod weather;

pub use cache::RunCache;
pub use market::AlphaVantageSource;
pub use news::GoogleNewsSource;
pub use traits::{MarketSource, NewsSource, WeatherSource};
pub use weather::OpenWeatherSource;
