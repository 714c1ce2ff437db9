mod ring_buf;
mod seq16;

pub use ring_buf::*;
pub use seq16::*;
