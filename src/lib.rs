pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod reader;
pub mod writer;

pub use application::bank::Bank;
pub use config::CoreConfig;
pub use domain::account::{Amount, Balance, Currency, UserId};
pub use error::{BankError, Result};
