//! Types and helpers shared by the wallet engine and the wallet server.
mod pesewas;

pub mod helpers;
pub mod op;

pub use pesewas::{Pesewas, PesewasConversionError, CURRENCY_CODE, CURRENCY_SYMBOL};
