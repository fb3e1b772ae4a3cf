//! Wallet-signature authentication: message parsing, signature recovery,
//! sign-in orchestration and session extraction.

pub mod coordinator;
pub mod message;
pub mod middleware;
pub mod session;
pub mod verify;

pub use coordinator::{AuthCoordinator, AuthError, AuthSettings, Authenticated};
pub use message::{parse, ParseError, ParsedMessage};
pub use middleware::{check_rate_limit, AppState, AuthSession};
pub use session::{generate_nonce, generate_session_token};
pub use verify::{verify_signature, SignatureError};
