pub mod action;
pub mod config;
pub mod drone;
pub mod error;
pub mod io;
pub mod operator;
pub mod paths;
pub mod persistence;
pub mod types;

pub use action::{ActionOp, Committer, PendingAction};
pub use drone::{Drone, DroneFilter, DroneStore};
pub use error::{DalsysError, Result};
pub use operator::{Operator, OperatorFilter, OperatorRef, OperatorStore};
pub use types::{LicenseClass, Mission};
