//! HTTP API handlers for pulse-gateway

pub mod checkin;
pub mod ecg;
pub mod health;

pub use checkin::checkin_routes;
pub use ecg::ecg_routes;
pub use health::health_routes;
