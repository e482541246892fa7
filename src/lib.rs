pub mod build;
pub mod collision;
pub mod components;
pub mod config;
pub mod error;
pub mod fleet;
pub mod game;
pub mod geometry;
pub mod hull;
pub mod network;
pub mod projectile;
pub mod render;
pub mod ship;
pub mod simulation;
pub mod tuning;
pub mod turret;
pub mod wire_format;
