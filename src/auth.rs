//! Auth-domain environments, app credentials, lease holders, and token models.

pub mod credentials;
pub mod environment;
pub mod id;
pub mod lock;
pub mod token;

pub use credentials::*;
pub use environment::*;
pub use id::*;
pub use lock::*;
pub use token::{record::*, secret::*};
