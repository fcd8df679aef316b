pub mod region;
pub mod store;
pub mod world;
