//! Control program for a competition robot: gamepad edges bound to bounded
//! motor outputs, a default mecanum drive and a timed autonomous chooser.

pub mod autonomous;
pub mod bindings;
pub mod config;
pub mod controller;
pub mod robot;
pub mod subsystems;
pub mod telemetry;
