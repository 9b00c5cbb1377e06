//! Pure content builders.
//!
//! Every scrollable list is flattened into styled lines plus a line-offset
//! table (`offsets[i]` is the first line of entry `i`, the last element is
//! the sentinel). Anything drawn after the sentinel, such as a pagination
//! spinner, is not selectable.

use std::collections::HashSet;

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use textwrap::{wrap, Options as WrapOptions};
use unicode_width::UnicodeWidthStr;

use crate::api::{Agent, Comment, Post};

pub const COLOR_BG: Color = Color::Rgb(26, 26, 46);
pub const COLOR_PRIMARY: Color = Color::Rgb(255, 69, 0);
pub const COLOR_ACCENT: Color = Color::Rgb(0, 209, 255);
pub const COLOR_TEXT_PRIMARY: Color = Color::Rgb(255, 255, 255);
pub const COLOR_TEXT_SECONDARY: Color = Color::Rgb(136, 136, 136);
pub const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);
pub const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);

pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Title bar, help line and the blank line under it.
pub const FEED_HEADER_HEIGHT: u16 = 3;
/// Status line under every list.
pub const FOOTER_HEIGHT: u16 = 1;
/// Help line between the detail viewport and the status line.
pub const DETAIL_HELP_HEIGHT: u16 = 1;
/// Title bar and blank line above the profile list.
pub const PROFILE_HEADER_HEIGHT: u16 = 2;

const EXCERPT_CHARS: usize = 100;
const SEPARATOR_WIDTH: usize = 42;
const MIN_CARD_WIDTH: usize = 8;

/// Inputs shared by every builder.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub width: u16,
    pub height: u16,
    pub upvoted: &'a HashSet<String>,
    pub spinner_frame: usize,
}

pub fn spinner(frame: usize) -> &'static str {
    SPINNER_FRAMES[frame % SPINNER_FRAMES.len()]
}

pub fn feed_viewport_height(height: u16) -> u16 {
    height.saturating_sub(FEED_HEADER_HEIGHT + FOOTER_HEIGHT)
}

pub fn profile_viewport_height(height: u16) -> u16 {
    height.saturating_sub(PROFILE_HEADER_HEIGHT + DETAIL_HELP_HEIGHT + FOOTER_HEIGHT)
}

pub fn detail_viewport_height(height: u16, header_lines: usize) -> u16 {
    let header = u16::try_from(header_lines).unwrap_or(u16::MAX);
    height.saturating_sub(header.saturating_add(DETAIL_HELP_HEIGHT + FOOTER_HEIGHT))
}

pub fn title_style() -> Style {
    Style::default()
        .fg(COLOR_TEXT_PRIMARY)
        .bg(COLOR_PRIMARY)
        .add_modifier(Modifier::BOLD)
}

pub fn help_style() -> Style {
    Style::default()
        .fg(COLOR_TEXT_SECONDARY)
        .add_modifier(Modifier::ITALIC)
}

fn author_style() -> Style {
    Style::default()
        .fg(COLOR_ACCENT)
        .add_modifier(Modifier::ITALIC)
}

fn community_style() -> Style {
    Style::default()
        .fg(COLOR_PRIMARY)
        .add_modifier(Modifier::BOLD)
}

fn header_style() -> Style {
    Style::default()
        .fg(COLOR_PRIMARY)
        .add_modifier(Modifier::BOLD)
}

fn upvoted_span() -> Span<'static> {
    Span::styled(" [UPVOTED]", header_style())
}

pub fn wrap_plain(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    if text.trim().is_empty() {
        return vec![Line::from(Span::styled(String::new(), style))];
    }
    let options = WrapOptions::new(width.max(1)).break_words(true);
    wrap(text, options)
        .into_iter()
        .map(|cow| Line::from(Span::styled(cow.into_owned(), style)))
        .collect()
}

fn line_width(line: &Line<'_>) -> usize {
    line.spans
        .iter()
        .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
        .sum()
}

/// Keeps a styled line intact when it fits, otherwise wraps its text.
fn fit_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Line<'static>> {
    let line = Line::from(spans);
    if line_width(&line) <= width {
        return vec![line];
    }
    let text: String = line.spans.iter().map(|span| span.content.as_ref()).collect();
    wrap_plain(&text, width, Style::default().fg(COLOR_TEXT_SECONDARY))
}

/// Cuts `body` to the card excerpt length, counting characters.
pub fn excerpt(body: &str) -> String {
    if body.chars().count() > EXCERPT_CHARS {
        let mut cut: String = body.chars().take(EXCERPT_CHARS - 3).collect();
        cut.push_str("...");
        cut
    } else {
        body.to_string()
    }
}

fn post_title(post: &Post) -> &str {
    if post.title.trim().is_empty() {
        "Post"
    } else {
        post.title.as_str()
    }
}

fn card_width(width: u16) -> usize {
    (width as usize).saturating_sub(2).max(MIN_CARD_WIDTH)
}

/// Frames `body` in a rounded border with one column of inner padding and
/// one blank margin line below.
fn card(body: Vec<Line<'static>>, outer: usize, border: Style) -> Vec<Line<'static>> {
    let inner = outer.saturating_sub(4);
    let mut lines = Vec::with_capacity(body.len() + 3);
    lines.push(Line::from(Span::styled(
        format!("╭{}╮", "─".repeat(outer.saturating_sub(2))),
        border,
    )));
    for line in body {
        let pad = inner.saturating_sub(line_width(&line));
        let mut spans = Vec::with_capacity(line.spans.len() + 3);
        spans.push(Span::styled("│ ", border));
        spans.extend(line.spans);
        spans.push(Span::raw(" ".repeat(pad)));
        spans.push(Span::styled(" │", border));
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(Span::styled(
        format!("╰{}╯", "─".repeat(outer.saturating_sub(2))),
        border,
    )));
    lines.push(Line::default());
    lines
}

fn border_style(selected: bool) -> Style {
    if selected {
        Style::default().fg(COLOR_PRIMARY)
    } else {
        Style::default().fg(COLOR_TEXT_SECONDARY)
    }
}

fn feed_card(post: &Post, selected: bool, upvoted: bool, width: u16) -> Vec<Line<'static>> {
    let outer = card_width(width);
    let inner = outer.saturating_sub(4);
    let bold = Style::default()
        .fg(COLOR_TEXT_PRIMARY)
        .add_modifier(Modifier::BOLD);

    let mut body = wrap_plain(post_title(post), inner, bold);
    body.extend(wrap_plain(
        &excerpt(&post.body),
        inner,
        Style::default().fg(COLOR_TEXT_PRIMARY),
    ));
    body.push(Line::default());

    let mut meta = vec![
        Span::styled(post.author.name.clone(), author_style()),
        Span::raw(" · "),
        Span::styled(format!("m/{}", post.community.name), community_style()),
        Span::raw(format!(" · {} 🦞", post.upvotes)),
    ];
    if upvoted {
        meta.push(upvoted_span());
    }
    body.extend(fit_spans(meta, inner));

    card(body, outer, border_style(selected))
}

fn loading_line(frame: usize, label: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("   {} {label}", spinner(frame)),
        Style::default().fg(COLOR_ACCENT),
    ))
}

/// Feed cards. An empty list renders only a hint line, which is not an entry.
pub fn feed_content(
    posts: &[Post],
    selected: usize,
    paginating: bool,
    ctx: &Context<'_>,
) -> (Vec<Line<'static>>, Vec<usize>) {
    if posts.is_empty() {
        let line = if paginating {
            loading_line(ctx.spinner_frame, "Loading...")
        } else {
            Line::from(Span::styled(
                "No posts found. Press 'r' to refresh.",
                help_style(),
            ))
        };
        return (vec![line], vec![0]);
    }

    let mut lines = Vec::new();
    let mut offsets = Vec::with_capacity(posts.len() + 1);
    for (index, post) in posts.iter().enumerate() {
        offsets.push(lines.len());
        lines.extend(feed_card(
            post,
            index == selected,
            ctx.upvoted.contains(&post.id),
            ctx.width,
        ));
    }
    offsets.push(lines.len());

    if paginating {
        lines.push(Line::default());
        lines.push(loading_line(ctx.spinner_frame, "Loading..."));
    }
    (lines, offsets)
}

/// Fixed header above the detail viewport.
pub fn detail_header(post: &Post, upvoted: bool, width: u16) -> Vec<Line<'static>> {
    let width = (width as usize).max(1);
    let mut lines = vec![
        Line::from(Span::styled(
            format!(" {} ", post.community.display_name),
            title_style(),
        )),
        Line::default(),
    ];
    lines.extend(wrap_plain(
        post_title(post),
        width,
        Style::default()
            .fg(COLOR_TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD),
    ));

    let mut meta = vec![
        Span::styled(post.author.name.clone(), author_style()),
        Span::raw(" · "),
        Span::styled(
            format!("{} Upvotes", post.upvotes),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
    ];
    if upvoted {
        meta.push(upvoted_span());
    }
    lines.extend(fit_spans(meta, width));
    lines.push(Line::from(Span::styled(
        "─".repeat(SEPARATOR_WIDTH.min(width)),
        Style::default().fg(COLOR_ACCENT),
    )));
    lines
}

fn comment_entry(comment: &Comment, selected: bool, width: usize) -> Vec<Line<'static>> {
    let border = Span::styled(
        "│ ",
        if selected {
            Style::default().fg(COLOR_PRIMARY)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        },
    );
    let inner = width.saturating_sub(2).max(1);

    let mut body = wrap_plain(&comment.body, inner, Style::default().fg(COLOR_TEXT_PRIMARY));
    let mut meta = vec![
        Span::styled(comment.author.name.clone(), author_style()),
        Span::raw(format!(" · {} 🦞", comment.upvotes)),
    ];
    if let Some(created) = comment.created_at {
        meta.push(Span::styled(
            format!(" · {}", created.format("%Y-%m-%d")),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ));
    }
    body.extend(fit_spans(meta, inner));
    body.push(Line::default());

    let mut lines: Vec<Line<'static>> = body
        .into_iter()
        .map(|line| {
            let mut spans = Vec::with_capacity(line.spans.len() + 1);
            spans.push(border.clone());
            spans.extend(line.spans);
            Line::from(spans)
        })
        .collect();
    lines.push(Line::default());
    lines
}

/// Post body followed by the comment list. The body is the preamble above
/// the first entry, so it scrolls into view when comment 0 is selected.
pub fn detail_content(
    post: &Post,
    comments: &[Comment],
    selected: usize,
    loading: bool,
    ctx: &Context<'_>,
) -> (Vec<Line<'static>>, Vec<usize>) {
    let width = (ctx.width as usize).saturating_sub(4).max(1);
    let mut lines = vec![Line::default()];
    lines.extend(wrap_plain(
        &post.body,
        width,
        Style::default().fg(COLOR_TEXT_PRIMARY),
    ));
    lines.push(Line::default());
    if let Some(link) = post.link.as_deref().filter(|link| !link.trim().is_empty()) {
        lines.push(Line::from(vec![
            Span::styled("Link: ", help_style()),
            Span::styled(
                link.to_string(),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::UNDERLINED),
            ),
        ]));
    }
    lines.push(Line::default());

    if comments.is_empty() {
        if loading {
            lines.push(loading_line(ctx.spinner_frame, "Loading discussion..."));
        } else {
            lines.push(Line::from(Span::styled(
                "No comments yet. Be the first!",
                help_style(),
            )));
        }
        let total = lines.len();
        return (lines, vec![total]);
    }

    lines.push(Line::from(Span::styled(
        format!("COMMENTS ({})", comments.len()),
        header_style(),
    )));
    lines.push(Line::default());

    let mut offsets = Vec::with_capacity(comments.len() + 1);
    for (index, comment) in comments.iter().enumerate() {
        offsets.push(lines.len());
        lines.extend(comment_entry(comment, index == selected, width));
    }
    offsets.push(lines.len());

    if loading {
        lines.push(loading_line(ctx.spinner_frame, "Loading more..."));
    }
    (lines, offsets)
}

fn profile_card(post: &Post, selected: bool, width: u16) -> Vec<Line<'static>> {
    let outer = card_width(width);
    let inner = outer.saturating_sub(4);
    let mut body = wrap_plain(
        post_title(post),
        inner,
        Style::default()
            .fg(COLOR_TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD),
    );
    let date = post
        .created_at
        .map(|created| created.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    body.extend(fit_spans(
        vec![Span::styled(
            format!("{} 🦞 · {date}", post.upvotes),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )],
        inner,
    ));
    card(body, outer, border_style(selected))
}

/// Agent stats followed by the agent's recent posts.
pub fn profile_content(
    agent: &Agent,
    posts: &[Post],
    selected: usize,
    ctx: &Context<'_>,
) -> (Vec<Line<'static>>, Vec<usize>) {
    let width = (ctx.width as usize).max(1);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let mut lines = fit_spans(
        vec![
            Span::styled("Description: ", bold),
            Span::raw(agent.description.clone()),
        ],
        width,
    );
    lines.push(Line::from(vec![
        Span::styled(
            format!("{} Karma", agent.karma),
            Style::default().fg(COLOR_ACCENT),
        ),
        Span::raw(format!(
            " · {} Followers · {} Following",
            agent.follower_count, agent.following_count
        )),
    ]));
    let status = if agent.claimed {
        "Claimed ✅"
    } else {
        "Pending Claim ⏳"
    };
    lines.push(Line::from(format!("Status: {status}")));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled("MY RECENT POSTS", header_style())));
    lines.push(Line::default());

    if posts.is_empty() {
        lines.push(Line::from(Span::styled(
            "You haven't posted anything yet.",
            help_style(),
        )));
        let total = lines.len();
        return (lines, vec![total]);
    }

    let mut offsets = Vec::with_capacity(posts.len() + 1);
    for (index, post) in posts.iter().enumerate() {
        offsets.push(lines.len());
        lines.extend(profile_card(post, index == selected, ctx.width));
    }
    offsets.push(lines.len());
    (lines, offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Author, Community};

    fn post(id: &str, body: &str) -> Post {
        Post {
            id: id.into(),
            title: format!("Title {id}"),
            body: body.into(),
            upvotes: 3,
            author: Author { name: "crab".into() },
            community: Community {
                name: "general".into(),
                display_name: "General".into(),
            },
            ..Post::default()
        }
    }

    fn ctx(upvoted: &HashSet<String>) -> Context<'_> {
        Context {
            width: 60,
            height: 30,
            upvoted,
            spinner_frame: 0,
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn excerpt_cuts_long_bodies() {
        let long = "x".repeat(150);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), 100);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn feed_offsets_track_card_heights() {
        let upvoted = HashSet::new();
        let posts = vec![post("a", "one"), post("b", &"word ".repeat(40))];
        let (lines, offsets) = feed_content(&posts, 0, false, &ctx(&upvoted));
        assert_eq!(offsets.len(), 3);
        assert_eq!(offsets[0], 0);
        // border, title, body, blank, meta, border, margin
        assert_eq!(offsets[1], 7);
        assert!(offsets[2] > offsets[1] + 7);
        assert_eq!(*offsets.last().unwrap(), lines.len());
    }

    #[test]
    fn pagination_spinner_sits_after_sentinel() {
        let upvoted = HashSet::new();
        let posts = vec![post("a", "one")];
        let (lines, offsets) = feed_content(&posts, 0, true, &ctx(&upvoted));
        assert_eq!(offsets, vec![0, 7]);
        assert_eq!(lines.len(), 9);
        assert!(text(&lines[8]).contains("Loading..."));
    }

    #[test]
    fn empty_feed_shows_a_hint_and_no_entries() {
        let upvoted = HashSet::new();
        let (lines, offsets) = feed_content(&[], 0, false, &ctx(&upvoted));
        assert_eq!(offsets, vec![0]);
        assert_eq!(text(&lines[0]), "No posts found. Press 'r' to refresh.");
    }

    #[test]
    fn upvoted_marker_is_rendered() {
        let mut upvoted = HashSet::new();
        upvoted.insert("a".to_string());
        let (lines, _) = feed_content(&[post("a", "one")], 0, false, &ctx(&upvoted));
        assert!(lines.iter().any(|line| text(line).contains("[UPVOTED]")));
    }

    #[test]
    fn cards_fill_the_same_width() {
        let upvoted = HashSet::new();
        let (lines, offsets) = feed_content(&[post("a", "one")], 0, false, &ctx(&upvoted));
        let widths: Vec<usize> = lines[..offsets[1] - 1].iter().map(line_width).collect();
        assert!(widths.iter().all(|width| *width == widths[0]));
    }

    #[test]
    fn detail_without_comments_has_no_entries() {
        let upvoted = HashSet::new();
        let (lines, offsets) = detail_content(&post("a", "body"), &[], 0, false, &ctx(&upvoted));
        assert_eq!(offsets, vec![lines.len()]);
        assert!(text(lines.last().unwrap()).contains("No comments yet"));
    }

    #[test]
    fn detail_comment_offsets_follow_preamble() {
        let upvoted = HashSet::new();
        let comments = vec![
            Comment {
                id: "c1".into(),
                body: "first".into(),
                ..Comment::default()
            },
            Comment {
                id: "c2".into(),
                body: "second".into(),
                ..Comment::default()
            },
        ];
        let (lines, offsets) =
            detail_content(&post("a", "body"), &comments, 1, false, &ctx(&upvoted));
        assert_eq!(offsets.len(), 3);
        assert!(offsets[0] > 0);
        assert!(text(&lines[offsets[0] - 2]).starts_with("COMMENTS (2)"));
        assert_eq!(offsets[2], lines.len());
    }

    #[test]
    fn profile_lists_recent_posts() {
        let upvoted = HashSet::new();
        let agent = Agent {
            name: "crab".into(),
            karma: 5,
            ..Agent::default()
        };
        let (lines, offsets) = profile_content(&agent, &[post("a", "")], 0, &ctx(&upvoted));
        assert_eq!(offsets.len(), 2);
        assert!(lines.iter().any(|line| text(line).contains("Pending Claim")));
    }
}
