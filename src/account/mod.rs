//! Accounts: identities, profile documents and the session lifecycle around them

pub mod error;
pub mod gateway;
pub mod identity;
pub mod profile;
pub mod profile_store;
pub mod session;
pub mod store;
pub mod verification;

pub use error::{AuthErrorCode, PortalError, ProviderError};
pub use gateway::AuthGateway;
pub use identity::{
    AuthMethod, FederatedProvider, Identity, IdentityProvider, LinkedProvider, OAuthCredential,
    PopupHandler,
};
pub use profile::{ProfileDocument, ProfileProvider};
pub use profile_store::ProfileStore;
pub use session::{SessionObserver, SessionState};
pub use store::{Document, DocumentStore, FieldValue};
pub use verification::{VerificationPoller, VerificationState};
