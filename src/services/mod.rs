//! Service layer for the change checker.
//!
//! This module contains the business logic for:
//! - Fetching and comparing resources (`ChangeDetector`)
//! - Delivering change notifications (`NotificationDispatcher`)

pub mod checker;
pub mod notifier;

pub use checker::{ChangeDetector, FetchResponse, Fetcher, ReqwestFetcher};
pub use notifier::{
    DispatchResult, NotificationDispatcher, NotificationMessage, Notifier, SmtpNotifier,
};
