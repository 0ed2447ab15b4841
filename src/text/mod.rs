//! The text serialization of a codeplug: a line-oriented, diff-friendly
//! grammar that round-trips the whole record tree.

mod export;
mod parse;
mod reader;

#[cfg(test)]
mod tests;

pub use export::quote_string;
pub use reader::Reader;
