pub mod config;
pub mod fetch;
pub mod locate;
pub mod pipeline;
pub mod process;
pub mod remote;
pub mod schema;
pub mod table;
