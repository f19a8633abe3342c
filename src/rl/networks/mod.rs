//! Neural Network Architectures
//!
//! Policy/value networks and the catalog that resolves them by name.

pub mod catalog;
pub mod fc_net;

pub use catalog::{default_fc_net, ModelBuilder, ModelCatalog, ModelSpec};
pub use fc_net::{Activation, FcNet, FcNetConfig};
