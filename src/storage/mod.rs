mod accounts;
mod error;

pub use self::accounts::{AccountStore, LoginOutcome, PlayerAccount};
pub use self::error::StorageError;
