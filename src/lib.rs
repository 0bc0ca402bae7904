mod dataset;
mod error;
mod machine;
mod network;
mod newton;
mod pfopt;
mod power;
mod runpf;
mod sweep;

pub use dataset::*;
pub use error::*;
pub use machine::*;
pub use network::*;
pub use newton::{PrintProgress, ProgressMonitor};
pub use pfopt::*;
pub use power::{calc_power, make_jac, mismatch};
pub use runpf::*;
pub use sweep::*;
