pub mod activity;
pub mod directory;
pub mod error;
pub mod events;
pub mod files;
pub mod model;
pub mod selection;
pub mod session;
pub mod store;
pub mod visibility;
