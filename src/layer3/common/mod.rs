// Layer3 Common Module - Shared utilities for the aggregators

pub mod rolling_window;

pub use rolling_window::RollingWindow;
