pub mod config;
pub mod mapper;
pub mod note;
pub mod song;
