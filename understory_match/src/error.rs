// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for the index and the observer.

use thiserror::Error;

use crate::span::SpanId;

/// Failures reported by [`MatchIndex`](crate::index::MatchIndex) and target resolution.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// The span id is stale or was never issued by this index.
    #[error("span {0:?} is not indexed")]
    UnknownSpan(SpanId),
    /// The span's anchors have no element ancestor to dispatch to.
    #[error("span anchors have no enclosing element")]
    NoElementAncestor,
    /// The span's anchors live in different trees.
    #[error("span anchors share no common ancestor")]
    DisjointAnchors,
}

/// Failures reported by [`Observer`](crate::observer::Observer) and its builder.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum ObserverError {
    /// [`ObserverBuilder::build`](crate::observer::ObserverBuilder::build) without a matcher.
    #[error("observer requires a matcher")]
    MissingMatcher,
    /// [`ObserverBuilder::build`](crate::observer::ObserverBuilder::build) without a hover handler.
    #[error("observer requires a hover handler")]
    MissingHoverHandler,
    /// `observe` was called while a root is already observed.
    #[error("observer is already running")]
    AlreadyObserving,
    /// The operation needs an observed root and there is none.
    #[error("observer is not running")]
    NotObserving,
    /// The observer was disconnected; construct a new one to observe again.
    #[error("observer was disconnected")]
    Disconnected,
    /// An index operation failed while reconciling.
    #[error(transparent)]
    Index(#[from] IndexError),
}
