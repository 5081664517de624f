// Library exports for the squiggle snake
// The server binary and the replay tool both build on these modules

pub mod bot;
pub mod choke;
pub mod config;
pub mod debug_logger;
pub mod engine;
pub mod error;
pub mod grid;
pub mod handler;
pub mod pathfinding;
pub mod predict;
pub mod region;
pub mod render;
pub mod replay;
pub mod simple_profiler;
pub mod squiggle;
pub mod state;
pub mod types;
