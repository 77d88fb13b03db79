//! Multi-vendor telemetry decoding and connection management for electric
//! unicycles: byte-stream framing, per-vendor decoders, alarm evaluation,
//! energy accounting, and a BLE-transport-agnostic connection manager.
//!
//! Seven vendor protocols are supported end to end: Kingsong, Gotway,
//! Veteran, Ninebot, NinebotZ, InMotion V1, and InMotion V2. Each vendor's
//! framer and decoder are pure and runtime-agnostic; only
//! [`connection::WheelConnectionManager`] depends on an async runtime, since
//! reconnect back-off and keepalive intervals are concrete durations that
//! have to actually be awaited.
//!
//! # Quickstart
//!
//! ```no_run
//! use eucproto::decoder::kingsong::KingsongDecoder;
//! use eucproto::decoder::Decoder;
//! use eucproto::state::WheelState;
//!
//! let mut decoder = KingsongDecoder::new();
//! let prior = WheelState::initial();
//! if let Ok(Some(decoded)) = decoder.decode(&[], &prior) {
//!     println!("speed: {}", decoded.new_state.speed_kmh());
//! }
//! ```
//!
//! A platform adapter implements [`connection::Transport`] and hands it to
//! [`connection::WheelConnectionManager::new`]; the manager then handles
//! classification, decoding, command dispatch, and reconnection.

pub mod alarm;
pub mod bms;
pub mod command;
pub mod connection;
pub mod csv;
pub mod decoder;
pub mod energy;
pub mod error;
pub mod framing;
pub mod state;
pub mod type_detector;
pub mod util;

pub use async_trait::async_trait;
