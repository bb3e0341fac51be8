pub mod bus;
pub mod config;
pub mod filter;
pub mod highlight;
pub mod logging;
pub mod render;
pub mod schedule;
pub mod selection;
pub mod series;
pub mod session;
pub mod store;
pub mod table;
