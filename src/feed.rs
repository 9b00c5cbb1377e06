use std::collections::HashSet;
use std::time::Duration;

use crate::api::{ApiError, Post, SortOption};
use crate::dispatch::Command;
use crate::layout::{self, Context};
use crate::pagination::Cursor;
use crate::viewport::Viewport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedKind {
    Hot,
    Personalized,
    Search(String),
}

impl FeedKind {
    pub fn title(&self, sort: SortOption) -> String {
        match self {
            FeedKind::Hot => format!("Global Feed ({})", sort.as_str()),
            FeedKind::Personalized => format!("Personalized Feed ({})", sort.as_str()),
            FeedKind::Search(query) => format!("Search: {query}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Replace,
    Append,
}

/// Token carried by a feed fetch and echoed by its completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub kind: FeedKind,
    pub sort: SortOption,
    pub limit: usize,
    pub offset: usize,
    pub mode: LoadMode,
}

#[derive(Debug, Clone)]
pub struct PagingPolicy {
    pub page_size: usize,
    pub preload_threshold: usize,
    pub retry_delay: Duration,
    pub retry_limit: u32,
}

impl Default for PagingPolicy {
    fn default() -> Self {
        Self {
            page_size: 20,
            preload_threshold: 2,
            retry_delay: Duration::from_secs(3),
            retry_limit: 3,
        }
    }
}

/// What the session should do with a feed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Superseded by a newer request; nothing changed.
    Stale,
    Loaded,
    /// Append failed; the same request goes out again after a delay.
    Retry(Command),
    /// Append failed past the retry limit.
    GaveUp(String),
    /// Reset failed; the list is empty and the error blocks the view.
    Failed(ApiError),
}

#[derive(Debug, Clone)]
pub struct FeedState {
    pub posts: Vec<Post>,
    pub selected: usize,
    pub cursor: Cursor<PageRequest>,
    pub kind: FeedKind,
    pub sort: SortOption,
    pub viewport: Viewport,
    generation: u64,
    policy: PagingPolicy,
    /// Posts whose loaded count includes an unconfirmed upvote.
    boosted: HashSet<String>,
}

impl FeedState {
    pub fn new(sort: SortOption, policy: PagingPolicy) -> Self {
        Self {
            posts: Vec::new(),
            selected: 0,
            cursor: Cursor::default(),
            kind: FeedKind::Hot,
            sort,
            viewport: Viewport::default(),
            generation: 0,
            policy,
            boosted: HashSet::new(),
        }
    }

    pub fn policy(&self) -> &PagingPolicy {
        &self.policy
    }

    pub fn title(&self) -> String {
        self.kind.title(self.sort)
    }

    pub fn selected_post(&self) -> Option<&Post> {
        self.posts.get(self.selected)
    }

    pub fn is_loading(&self) -> bool {
        self.cursor.is_paginating()
    }

    /// Clears the list, cursor and selection and requests the first page.
    pub fn reset_and_load(&mut self, kind: FeedKind) -> Command {
        self.kind = kind;
        self.posts.clear();
        self.boosted.clear();
        self.selected = 0;
        self.generation = self.generation.wrapping_add(1);
        self.viewport.go_to_top();

        let request = self.request(0, LoadMode::Replace);
        self.cursor.reset(request.clone());
        tracing::debug!(generation = self.generation, kind = ?self.kind, "feed reset");
        Command::FetchFeed(request)
    }

    pub fn refresh(&mut self) -> Command {
        self.reset_and_load(self.kind.clone())
    }

    pub fn cycle_sort(&mut self) -> Command {
        self.sort = self.sort.next();
        self.refresh()
    }

    /// Requests the next page unless one is in flight or the list is done.
    pub fn load_more(&mut self) -> Option<Command> {
        if !self.cursor.can_load_more() || self.posts.is_empty() {
            return None;
        }
        let request = self.request(self.posts.len(), LoadMode::Append);
        if self.cursor.begin(request.clone()) {
            Some(Command::FetchFeed(request))
        } else {
            None
        }
    }

    pub fn select_next(&mut self) -> Option<Command> {
        if self.selected + 1 >= self.posts.len() {
            return None;
        }
        self.selected += 1;
        self.cursor.clear_error();
        if self.selected + self.policy.preload_threshold >= self.posts.len() {
            return self.load_more();
        }
        None
    }

    pub fn select_prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.cursor.clear_error();
        }
    }

    pub fn apply_page(
        &mut self,
        request: PageRequest,
        result: Result<Vec<Post>, ApiError>,
    ) -> PageOutcome {
        if !self.cursor.is_current(&request) {
            tracing::debug!(
                generation = request.generation,
                offset = request.offset,
                "dropping stale feed page"
            );
            return PageOutcome::Stale;
        }

        match (result, request.mode) {
            (Ok(page), mode) => {
                let exhausted =
                    page.len() < request.limit || matches!(request.kind, FeedKind::Search(_));
                match mode {
                    LoadMode::Replace => {
                        self.posts = page;
                        self.selected = 0;
                        self.viewport.go_to_top();
                    }
                    LoadMode::Append => self.posts.extend(page),
                }
                self.cursor.complete(self.posts.len(), exhausted);
                PageOutcome::Loaded
            }
            (Err(err), LoadMode::Replace) => {
                self.cursor.abandon();
                PageOutcome::Failed(err)
            }
            (Err(err), LoadMode::Append) => {
                if self.cursor.attempts() <= self.policy.retry_limit {
                    let attempt = self.cursor.retry();
                    tracing::warn!(attempt, error = %err, "retrying feed page");
                    PageOutcome::Retry(Command::FetchFeedAfter {
                        request,
                        delay: self.policy.retry_delay,
                    })
                } else {
                    let message = format!("Couldn't load more posts: {err}");
                    self.cursor.fail(message.clone());
                    PageOutcome::GaveUp(message)
                }
            }
        }
    }

    /// Applies `delta` to the local upvote count of every copy of `post_id`.
    /// Counts an optimistic upvote on the loaded copy of `post_id`.
    pub fn boost(&mut self, post_id: &str) {
        if let Some(post) = self.posts.iter_mut().find(|post| post.id == post_id) {
            post.upvotes += 1;
            self.boosted.insert(post_id.to_string());
        }
    }

    /// Takes back an optimistic upvote. A copy loaded after the vote
    /// already carries the server's count and is left alone.
    pub fn unboost(&mut self, post_id: &str) {
        if !self.boosted.remove(post_id) {
            return;
        }
        if let Some(post) = self.posts.iter_mut().find(|post| post.id == post_id) {
            post.upvotes -= 1;
        }
    }

    pub fn settle(&mut self, post_id: &str) {
        self.boosted.remove(post_id);
    }

    pub fn is_boosted(&self, post_id: &str) -> bool {
        self.boosted.contains(post_id)
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.viewport
            .resize(width, layout::feed_viewport_height(height));
    }

    /// Rebuilds the rendered cards without moving the scroll position.
    pub fn relayout(&mut self, ctx: &Context<'_>) {
        let (lines, offsets) =
            layout::feed_content(&self.posts, self.selected, self.is_loading(), ctx);
        self.viewport.set_content(lines, offsets);
        self.viewport.scroll_by(0);
    }

    /// Rebuilds the cards and scrolls the selection into view.
    pub fn refresh_view(&mut self, ctx: &Context<'_>) {
        self.relayout(ctx);
        self.viewport.sync_to(self.selected);
    }

    fn request(&self, offset: usize, mode: LoadMode) -> PageRequest {
        PageRequest {
            generation: self.generation,
            kind: self.kind.clone(),
            sort: self.sort,
            limit: self.policy.page_size,
            offset,
            mode,
        }
    }
}
