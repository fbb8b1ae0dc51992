// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-session conversation state

pub mod store;

pub use store::{InMemorySessionStore, SessionLock, SessionStore};
