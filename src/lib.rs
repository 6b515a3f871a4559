pub mod browser;
pub mod config;
pub mod duration;
pub mod exchange;
pub mod extract;
pub mod page;
pub mod selectors;
