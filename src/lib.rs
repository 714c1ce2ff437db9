//! Reliable, ordered delivery of byte messages over an unreliable byte pipe
//! such as a serial line.
//!
//! ```no_run
//! use serial_arq::{duplex, ConnectionBuilder};
//!
//! let (port, _peer) = duplex();
//! let mut conn = ConnectionBuilder::default().build(port).unwrap();
//! conn.send_str("hello").unwrap();
//! while conn.available().unwrap() {
//!     while let Some(byte) = conn.read_byte() {
//!         print!("{}", byte as char);
//!     }
//! }
//! ```

pub mod error;
pub mod layer;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use error::{Error, Result};
pub use layer::{BuildError, Connection, ConnectionBuilder};
pub use transport::{duplex, ByteTransport, FaultyPort, MemPort};
pub use utils::Seq16;
