//! Posts a reminder comment for every configured Notion shopping list that
//! still has unchecked items.

pub mod config;
pub mod dispatch;
pub mod message;
pub mod model;
pub mod notion;
pub mod pipeline;
pub mod store;
pub mod throttle;
