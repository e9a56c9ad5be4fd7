//! Top-level facade crate for wsTether.
//!
//! Re-exports the protocol core and the connection client so users can depend on a single crate.

pub mod core {
    pub use wstether_core::*;
}

pub mod client {
    pub use wstether_client::*;
}
