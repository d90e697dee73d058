//! Non-iterative reconstruction: filtered backprojection and gridrec.

pub mod filter;
pub mod fbp;
pub mod gridrec;

pub use filter::{FilterName, RowFilter};
pub use fbp::Fbp;
pub use gridrec::{Gridrec, KaiserBessel};
