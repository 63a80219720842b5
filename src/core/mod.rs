//! # Core Application Logic
//!
//! This module contains Copilot Chat's business logic.
//! It knows nothing about terminals, HTTP or websockets.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • State (app data)     │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │                         │
//!                    │  No I/O. No UI. Pure.   │
//!                    └───────────┬─────────────┘
//!                                │ Vec<Effect>
//!            ┌───────────────────┴───────────────────┐
//!            ▼                                       ▼
//!     ┌────────────┐                          ┌────────────┐
//!     │    TUI     │                          │ Dispatcher │
//!     │  Adapter   │                          │ (backend + │
//!     │ (ratatui)  │                          │  copilot)  │
//!     └────────────┘                          └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: The `App` struct, all application state in one place
//! - [`action`]: `Action`, `Effect` and the `update()` reducer
//! - [`thread`], [`composer`], [`conversations`], [`copilot`], [`profile`],
//!   [`auth`], [`emoji`], [`toast`]: the per-feature state machines
//! - [`route`]: screens and the auth guard
//! - [`config`], [`session`]: on-disk settings and the stored session

pub mod action;
pub mod auth;
pub mod composer;
pub mod config;
pub mod conversations;
pub mod copilot;
pub mod emoji;
pub mod profile;
pub mod route;
pub mod session;
pub mod state;
pub mod thread;
pub mod toast;
