pub mod event_cursor;
pub mod funding;
pub mod platform;
pub mod pool;
pub mod pool_day_data;
pub mod position;
pub mod stake;
pub mod token;
pub mod transaction;
pub mod user;
