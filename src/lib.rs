pub mod auth;
pub mod blacklist;
pub mod claims;
pub mod clock;
pub mod configuration;
pub mod error;
pub mod factory;
pub mod manager;
pub mod payload;
pub mod signer;
pub mod storage;
pub mod telemetry;
pub mod token;
pub mod validators;

pub use auth::{Authenticator, JwtAuth, JwtSubject, TokenSource};
pub use blacklist::Blacklist;
pub use claims::{Claim, ClaimCollection, ClaimInput};
pub use clock::{Clock, FixedClock, SystemClock};
pub use configuration::{get_configuration, JwtSettings, Settings};
pub use error::{AuthError, ConfigError, Error, Result, StorageError};
pub use factory::PayloadFactory;
pub use manager::Manager;
pub use payload::Payload;
pub use signer::{generate_secret, JsonWebTokenSigner, Signer};
pub use storage::{InMemoryStorage, Storage};
pub use token::Token;
pub use validators::{Mode, PayloadValidator, TokenValidator};
