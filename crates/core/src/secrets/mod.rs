//! At-rest protection for stored platform credentials.

mod token_cipher;

pub use token_cipher::*;
