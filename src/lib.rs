//! # Grovemart (Grocery Storefront Identity Demo)
//!
//! `grovemart` signs shoppers in against an external identity provider using
//! three concurrent OIDC schemes (standard, fraud-protection, email OTP),
//! exposes profile-management endpoints backed by a directory service, and
//! proxies calls to the downstream grocery-ordering API with bearer tokens
//! attached.
//!
//! ## Sign-in schemes
//!
//! Each scheme is an immutable descriptor loaded at startup: its own OIDC
//! client configuration, issuer metadata, and session-cookie namespace. A
//! scheme never inspects or mutates another scheme's cookies; the only shared
//! step is the per-request scheme selection in [`auth::router`].
//!
//! ## Step-up (multi-factor) assurance
//!
//! Sensitive operations require the identity provider to have asserted the
//! `acrs=c1` authentication context. The assurance is re-derived from the
//! principal's claims on every request because a session may be elevated
//! mid-lifetime by re-authentication.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod directory;
pub mod downstream;
