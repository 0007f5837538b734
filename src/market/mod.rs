//! Market module - swap events and price impact measurement

pub mod event;
pub mod impact;

pub use event::{SwapDirection, SwapEvent, TradeDirection};
pub use impact::ImpactMeasurement;
