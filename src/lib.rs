//! # swipeclean-sync
//!
//! Decision storage and cross-device synchronization for a swipe-to-triage
//! photo cleaner.
//!
//! ## Overview
//!
//! While triaging a library the user keeps or deletes one asset at a time.
//! Those decisions live in a local [`store::DecisionStore`] and are shared
//! with other devices through a single remote record. Each sync cycle
//! fetches that record, merges it with local state and writes the result
//! back to both sides.
//!
//! ## Merge rules
//!
//! - Kept entries take the newest timestamp seen on either side
//! - Deleted sets are unioned
//! - Counters are high-water marks, never summed
//! - A reset on any device clears the shared record and stamps a reset
//!   time; only local decisions made after it survive the next sync
//!
//! ## Architecture
//!
//! - Data model and wire format ([`snapshot`], [`merge`])
//! - Local persistence ([`store`]) and the remote backend ([`remote`])
//! - The sync cycle, retries and status ([`sync`])
//! - The media library and triage flow ([`assets`], [`triage`])
//! - Settings, paths, logging and the operation log ([`settings`], [`config`],
//!   [`logger`], [`history`])
//! - CLI handlers ([`handlers`])

/// Media library access.
///
/// Defines the [`assets::AssetSource`] seam and a directory-backed
/// implementation where files are assets and top-level folders are albums.
pub mod assets;

/// Platform-agnostic configuration directory management.
///
/// Locates the decisions file, settings, history, log and default remote
/// following platform conventions (XDG on Linux, Application Support on
/// macOS, AppData on Windows).
pub mod config;

/// Command handlers for the CLI.
pub mod handlers;

/// Rolling log of recent sync cycles and resets.
pub mod history;

/// Logging configuration and utilities.
///
/// Sets up dual logging to both console (configurable via `RUST_LOG` environment
/// variable) and a persistent log file in the config directory. Includes automatic
/// log rotation when files exceed size limits.
pub mod logger;

/// Pure merge of a local and a remote snapshot.
pub mod merge;

/// Remote snapshot backends.
///
/// One record per user, fetched and replaced whole. Ships a shared-directory
/// backend and an in-memory one with failure injection.
pub mod remote;

/// User settings stored as TOML: sync interval, retry limits, kept policy,
/// remote location and device ID.
pub mod settings;

/// Snapshot types and the remote wire encoding.
pub mod snapshot;

/// Local decision store over a durable key/value mapping.
pub mod store;

/// Sync coordination.
///
/// Runs fetch → merge → local write → remote write, coalesces concurrent
/// requests, retries remote calls with backoff and publishes a status.
pub mod sync;

/// Headless triage session: queue, keep, stage for deletion, undo, review.
pub mod triage;
