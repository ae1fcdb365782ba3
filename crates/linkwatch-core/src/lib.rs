//! Core infrastructure for linkwatch.
//!
//! This crate provides the pieces shared by every linkwatch component:
//! - A typed publish/subscribe [`EventBus`] with unsubscribe handles
//! - [`ConfigError`], the validation error returned by every config builder
//! - [`BoxError`], the error type used at external seams

pub mod error;
pub mod events;

pub use error::{BoxError, ConfigError};
pub use events::{EventBus, EventListener, FnListener, LinkEvent, Subscription};
