//! Pagination cursor shared by every paged list.
//!
//! The cursor is a small state machine instead of a pair of booleans: a list
//! is either idle, waiting on exactly one page request, or parked after a
//! failed append. Only an idle or failed cursor may issue a new request, so
//! the one-request-in-flight guard holds by construction.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState<R> {
    Idle,
    InFlight { request: R, attempts: u32 },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor<R> {
    offset: usize,
    all_loaded: bool,
    state: FetchState<R>,
}

impl<R> Default for Cursor<R> {
    fn default() -> Self {
        Self {
            offset: 0,
            all_loaded: false,
            state: FetchState::Idle,
        }
    }
}

impl<R: PartialEq + Clone> Cursor<R> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn all_loaded(&self) -> bool {
        self.all_loaded
    }

    pub fn state(&self) -> &FetchState<R> {
        &self.state
    }

    pub fn is_paginating(&self) -> bool {
        matches!(self.state, FetchState::InFlight { .. })
    }

    pub fn last_error(&self) -> Option<&str> {
        match &self.state {
            FetchState::Failed { error } => Some(error.as_str()),
            _ => None,
        }
    }

    pub fn in_flight(&self) -> Option<&R> {
        match &self.state {
            FetchState::InFlight { request, .. } => Some(request),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match &self.state {
            FetchState::InFlight { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    /// True when an automatic continuation fetch may be issued.
    pub fn can_load_more(&self) -> bool {
        !self.all_loaded && !self.is_paginating()
    }

    /// Forgets everything loaded so far and marks `request` in flight.
    pub fn reset(&mut self, request: R) {
        self.offset = 0;
        self.all_loaded = false;
        self.state = FetchState::InFlight {
            request,
            attempts: 1,
        };
    }

    /// Marks `request` in flight unless a page is already on its way.
    pub fn begin(&mut self, request: R) -> bool {
        if self.is_paginating() {
            return false;
        }
        self.state = FetchState::InFlight {
            request,
            attempts: 1,
        };
        true
    }

    /// Whether a completion for `request` is the one this cursor waits on.
    pub fn is_current(&self, request: &R) -> bool {
        self.in_flight() == Some(request)
    }

    /// Records a successful page. `loaded` is the list length after merging.
    pub fn complete(&mut self, loaded: usize, exhausted: bool) {
        self.offset = loaded;
        if exhausted {
            self.all_loaded = true;
        }
        self.state = FetchState::Idle;
    }

    /// Keeps the guard set for another attempt of the in-flight request.
    /// Returns the attempt number now in flight.
    pub fn retry(&mut self) -> u32 {
        if let FetchState::InFlight { attempts, .. } = &mut self.state {
            *attempts += 1;
            *attempts
        } else {
            0
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = FetchState::Failed {
            error: error.into(),
        };
    }

    /// Drops the in-flight request without recording an error.
    pub fn abandon(&mut self) {
        self.state = FetchState::Idle;
    }

    pub fn clear_error(&mut self) {
        if matches!(self.state, FetchState::Failed { .. }) {
            self.state = FetchState::Idle;
        }
    }

    pub fn mark_all_loaded(&mut self) {
        self.all_loaded = true;
    }
}
