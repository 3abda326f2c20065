pub use parley_common::{Error, Result};

parley_common::impl_context!();
