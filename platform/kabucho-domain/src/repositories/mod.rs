pub mod action_feed;
pub mod market_data;
pub mod price_store;
pub mod reports;
