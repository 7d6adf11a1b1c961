#![doc = "tap-sentry-core: synchronisation engine for the Sentry tap."]

//! This crate holds everything that talks to the Sentry API and everything
//! that decides what gets emitted: authentication, pagination, bookmarks,
//! Singer output and the per-stream sync engine.
//! CLI parsing, config files and schema loading live in the `tap-sentry` crate.
//!
//! # Usage
//! Build a [`client::SentryClient`] over a [`client::ReqwestTransport`], hand it
//! to a [`synchronise::SyncEngine`] with a [`contract::RecordWriter`], then call
//! [`synchronise::SyncEngine::sync`] per stream.

pub mod auth;
pub mod bookmarks;
pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod output;
pub mod pagination;
pub mod synchronise;
