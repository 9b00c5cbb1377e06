use std::collections::HashSet;

use crate::api::{ApiError, Comment, Post};
use crate::dispatch::Command;
use crate::feed::{LoadMode, PagingPolicy};
use crate::layout::{self, Context};
use crate::pagination::Cursor;
use crate::viewport::Viewport;

/// Token for a comment page, keyed by the post it belongs to and the
/// refresh that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRequest {
    pub post_id: String,
    pub generation: u64,
    pub limit: usize,
    pub offset: usize,
    pub mode: LoadMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommentOutcome {
    Stale,
    Loaded,
    /// First page failed; blocks the view until retried.
    Failed(ApiError),
    /// A continuation page failed; shown as a transient message.
    AppendFailed(String),
}

#[derive(Debug, Clone)]
pub struct DetailState {
    pub post: Post,
    pub comments: Vec<Comment>,
    pub selected: usize,
    pub cursor: Cursor<CommentRequest>,
    pub viewport: Viewport,
    generation: u64,
    /// The post's count includes an unconfirmed upvote.
    boosted: bool,
    header_lines: usize,
    page_size: usize,
    preload_threshold: usize,
}

impl DetailState {
    /// Opens `post` and requests its first comment page.
    pub fn open(post: Post, policy: &PagingPolicy) -> (Self, Command) {
        let mut detail = Self {
            post,
            comments: Vec::new(),
            selected: 0,
            cursor: Cursor::default(),
            viewport: Viewport::default(),
            generation: 0,
            boosted: false,
            header_lines: 0,
            page_size: policy.page_size,
            preload_threshold: policy.preload_threshold,
        };
        let command = detail.refresh();
        (detail, command)
    }

    pub fn post_id(&self) -> &str {
        &self.post.id
    }

    pub fn is_loading(&self) -> bool {
        self.cursor.is_paginating()
    }

    /// Re-requests the first page, replacing whatever is loaded.
    pub fn refresh(&mut self) -> Command {
        self.generation = self.generation.wrapping_add(1);
        let request = self.request(0, LoadMode::Replace);
        self.cursor.reset(request.clone());
        Command::FetchComments(request)
    }

    pub fn load_more(&mut self) -> Option<Command> {
        if self.comments.is_empty() || self.cursor.is_paginating() {
            return None;
        }
        let request = self.request(self.comments.len(), LoadMode::Append);
        self.cursor
            .begin(request.clone())
            .then_some(Command::FetchComments(request))
    }

    pub fn select_next(&mut self) -> Option<Command> {
        if self.selected + 1 >= self.comments.len() {
            return None;
        }
        self.selected += 1;
        self.cursor.clear_error();
        if self.selected + self.preload_threshold >= self.comments.len()
            && self.cursor.can_load_more()
        {
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

    pub fn apply_comments(
        &mut self,
        request: CommentRequest,
        result: Result<Vec<Comment>, ApiError>,
    ) -> CommentOutcome {
        if request.post_id != self.post.id || !self.cursor.is_current(&request) {
            tracing::debug!(post_id = %request.post_id, "dropping stale comment page");
            return CommentOutcome::Stale;
        }

        match (result, request.mode) {
            (Ok(page), LoadMode::Replace) => {
                let exhausted = page.len() < request.limit;
                self.comments = page;
                self.selected = 0;
                self.viewport.go_to_top();
                self.cursor.complete(self.comments.len(), exhausted);
                CommentOutcome::Loaded
            }
            (Ok(page), LoadMode::Append) => {
                let received = page.len();
                let known: HashSet<String> =
                    self.comments.iter().map(|comment| comment.id.clone()).collect();
                let before = self.comments.len();
                self.comments
                    .extend(page.into_iter().filter(|comment| !known.contains(&comment.id)));
                let added = self.comments.len() - before;
                self.cursor
                    .complete(self.comments.len(), added == 0 || received < request.limit);
                CommentOutcome::Loaded
            }
            (Err(err), LoadMode::Replace) => {
                self.cursor.abandon();
                CommentOutcome::Failed(err)
            }
            (Err(err), LoadMode::Append) => {
                let message = format!("Couldn't load more comments: {err}");
                self.cursor.fail(message.clone());
                CommentOutcome::AppendFailed(message)
            }
        }
    }

    pub fn boost(&mut self, post_id: &str) {
        if self.post.id == post_id {
            self.post.upvotes += 1;
            self.boosted = true;
        }
    }

    pub fn unboost(&mut self, post_id: &str) {
        if self.post.id == post_id && self.boosted {
            self.post.upvotes -= 1;
            self.boosted = false;
        }
    }

    pub fn settle(&mut self, post_id: &str) {
        if self.post.id == post_id {
            self.boosted = false;
        }
    }

    /// Marks a post opened from a copy that already counted a pending upvote.
    pub fn inherit_boost(&mut self, boosted: bool) {
        self.boosted = boosted;
    }

    pub fn header(
        &self,
        upvoted: &HashSet<String>,
        width: u16,
    ) -> Vec<ratatui::text::Line<'static>> {
        layout::detail_header(&self.post, upvoted.contains(&self.post.id), width)
    }

    /// Rebuilds the header and comment list for the current frame size.
    pub fn relayout(&mut self, ctx: &Context<'_>) {
        self.header_lines = self.header(ctx.upvoted, ctx.width).len();
        self.viewport.resize(
            ctx.width,
            layout::detail_viewport_height(ctx.height, self.header_lines),
        );
        let (lines, offsets) = layout::detail_content(
            &self.post,
            &self.comments,
            self.selected,
            self.is_loading(),
            ctx,
        );
        self.viewport.set_content(lines, offsets);
        self.viewport.scroll_by(0);
    }

    pub fn refresh_view(&mut self, ctx: &Context<'_>) {
        self.relayout(ctx);
        self.viewport.sync_to(self.selected);
    }

    fn request(&self, offset: usize, mode: LoadMode) -> CommentRequest {
        CommentRequest {
            post_id: self.post.id.clone(),
            generation: self.generation,
            limit: self.page_size,
            offset,
            mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comments(range: std::ops::Range<usize>) -> Vec<Comment> {
        range
            .map(|i| Comment {
                id: format!("c{i}"),
                ..Comment::default()
            })
            .collect()
    }

    fn requested(command: Command) -> CommentRequest {
        match command {
            Command::FetchComments(request) => request,
            other => panic!("expected comment fetch, got {other:?}"),
        }
    }

    fn open(id: &str) -> (DetailState, CommentRequest) {
        let post = Post {
            id: id.into(),
            ..Post::default()
        };
        let (detail, command) = DetailState::open(post, &PagingPolicy::default());
        (detail, requested(command))
    }

    #[test]
    fn page_for_another_post_is_dropped() {
        let (mut detail, request) = open("a");
        let foreign = CommentRequest {
            post_id: "b".into(),
            ..request.clone()
        };
        assert_eq!(detail.apply_comments(foreign, Ok(comments(0..3))), CommentOutcome::Stale);
        assert!(detail.comments.is_empty());
        assert!(detail.is_loading());

        assert_eq!(detail.apply_comments(request, Ok(comments(0..3))), CommentOutcome::Loaded);
        assert_eq!(detail.comments.len(), 3);
    }

    #[test]
    fn append_skips_comments_already_shown() {
        let (mut detail, request) = open("a");
        detail.apply_comments(request, Ok(comments(0..20)));
        let more = requested(detail.load_more().unwrap());
        assert_eq!(more.offset, 20);

        // a service that ignores paging returns the first page again
        assert_eq!(detail.apply_comments(more, Ok(comments(0..20))), CommentOutcome::Loaded);
        assert_eq!(detail.comments.len(), 20);
        assert!(detail.cursor.all_loaded());
    }

    #[test]
    fn selection_near_end_loads_more() {
        let (mut detail, request) = open("a");
        detail.apply_comments(request, Ok(comments(0..20)));
        detail.selected = 16;
        assert!(detail.select_next().is_none());
        let more = requested(detail.select_next().unwrap());
        assert_eq!(more.mode, LoadMode::Append);
        assert!(detail.select_next().is_none());
    }

    #[test]
    fn failed_append_is_not_blocking() {
        let (mut detail, request) = open("a");
        detail.apply_comments(request, Ok(comments(0..20)));
        let more = requested(detail.load_more().unwrap());
        let outcome = detail.apply_comments(more, Err(ApiError::Network("down".into())));
        assert!(matches!(outcome, CommentOutcome::AppendFailed(_)));
        assert_eq!(detail.comments.len(), 20);
        assert!(detail.load_more().is_some());
    }

    #[test]
    fn refresh_outdates_the_page_in_flight() {
        let (mut detail, first) = open("a");
        let second = requested(detail.refresh());
        assert_ne!(first, second);

        assert_eq!(detail.apply_comments(first, Ok(comments(0..1))), CommentOutcome::Stale);
        assert!(detail.is_loading());
        assert_eq!(detail.apply_comments(second, Ok(comments(0..2))), CommentOutcome::Loaded);
        assert_eq!(detail.comments.len(), 2);
    }

    #[test]
    fn failed_first_page_blocks() {
        let (mut detail, request) = open("a");
        let outcome = detail.apply_comments(request, Err(ApiError::NotFound("gone".into())));
        assert!(matches!(outcome, CommentOutcome::Failed(_)));
        assert!(!detail.is_loading());
    }
}
