//! Protocol module for encoding commands and decoding advertisements.
//!
//! This module contains the implementations for:
//! - Command opcode and password encoding
//! - Curtain advertisement decoding
//! - CRC calculation

pub mod advertisement;
pub mod commands;
pub mod crc;

pub use advertisement::CurtainAdvertisement;
pub use commands::{encode, encode_position, payload_bytes, CommandKey, EncodedPassword};
pub use crc::calculate_crc32;
