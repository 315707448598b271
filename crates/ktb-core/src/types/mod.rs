//! Core data types shared by the exchange client and the bot.
//!
//! Amounts are [`rust_decimal::Decimal`] throughout; the exchange sends them
//! as strings and floats would lose the 8th fractional digit.

pub mod assets;
pub mod enums;
pub mod trading;

pub use assets::*;
pub use enums::*;
pub use trading::*;
