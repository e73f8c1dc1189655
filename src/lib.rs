pub mod actions;
pub mod app;
pub mod config;
pub mod coordinator;
pub mod geometry;
pub mod hotkey;
pub mod index_monitor;
pub mod indexer;
pub mod model;
pub mod navigation;
pub mod pointer;
pub mod search;
pub mod service;
pub mod session;
pub mod timer;
pub mod ui_model;
