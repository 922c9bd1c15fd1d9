//! Adapters for the hosted Firebase backend.

pub mod firebase_auth;
pub mod firestore;

pub use firebase_auth::FirebaseAuthProvider;
pub use firestore::FirestoreDocumentStore;
