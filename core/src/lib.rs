//! keyturn-core: refresh token rotation authority
//!
//! This crate contains all logic for refresh-token rotation with automatic
//! reuse detection and family-wide revocation. Tokens descended from one
//! grant form a family with a single active head; exchanging the head
//! rotates it, and presenting any retired token revokes the whole family.
//! The crate depends only on abstract collaborator traits (Store,
//! AccessTokenIssuer, AuditSink, Clock, Environment) and never imports a
//! concrete runtime surface.

pub mod audit;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod platform;
pub mod rotation;
pub mod scope;
pub mod store;
pub mod token;

pub mod test_support;
