// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Entity providers backing node and user selectors

pub mod nodes;
pub mod traced;
pub mod users;

pub use nodes::{LocalNodeProvider, NoOpNodeProvider};
pub use traced::{TracedNodeProvider, TracedUserProvider};
pub use users::{DirectoryUserProvider, NoOpUserProvider};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use nodes::FakeNodeProvider;
#[cfg(any(test, feature = "test-support"))]
pub use users::FakeUserProvider;
