//! Replysmith: drafts replies inside web chat composers.
//!
//! A watcher discovers empty composer fields on a host page. For each one
//! the orchestrator identifies the recipient, summarizes the visible thread,
//! researches the recipient, classifies the conversation, generates a draft
//! (through a semantic completion cache when configured) and writes it into
//! the field. Nothing is ever sent.
//!
//! See `DESIGN.md` for the module layout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;
pub mod providers;
pub mod settings;
pub mod storage;
pub mod types;

pub mod dom;
pub mod extractors;
pub mod injector;

pub mod cache;
pub mod history;
pub mod pipeline;

pub mod orchestrator;
