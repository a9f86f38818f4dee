pub mod bar;
pub mod channel;
pub mod config;
pub mod engine;
pub mod event;
pub mod executor;
pub mod paths;
pub mod protocol;
pub mod resolver;
pub mod sink;
pub mod startup;
