//! Implementations of the identity provider, document store and email service

pub mod emailjs;
pub mod firebase_auth;
pub mod firestore;
pub mod memory;

pub use emailjs::EmailJs;
pub use firebase_auth::FirebaseAuth;
pub use firestore::{Firestore, TokenSource};
pub use memory::{InMemoryDocumentStore, InMemoryIdentityProvider, RecordingEmailService};
