use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::Receiver;
use crossterm::event::{self, Event as TermEvent, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use unicode_width::UnicodeWidthStr;

use crate::api::Agent;
use crate::composer::{Composer, Purpose};
use crate::detail::DetailState;
use crate::dispatch::Dispatcher;
use crate::event::Event;
use crate::layout::{
    self, help_style, spinner, title_style, COLOR_ACCENT, COLOR_BG, COLOR_ERROR, COLOR_PRIMARY,
    COLOR_SUCCESS, COLOR_TEXT_PRIMARY, COLOR_TEXT_SECONDARY,
};
use crate::profile::ProfileState;
use crate::session::{ErrorBanner, Mode, Registration, Session};

const FEED_HELP: &str = "j/k: select • PgUp/PgDn: scroll • enter: view • u: upvote • \
                         o: open • p: profile • f/h: feeds • s: sort • /: search • n: new • \
                         r: refresh • q: quit";
const DETAIL_HELP: &str = "esc: back • j/k: select comment • l: more • PgUp/PgDn: scroll • \
                           u: upvote post • F: follow/unfollow • c: comment • o: open";
const PROFILE_HELP: &str = "esc: back • enter: view • u: upvote • x: delete post • q: quit";
const COMPOSER_HELP: &str = "enter: next/submit • esc: cancel";

/// Owns the terminal for the lifetime of the session.
pub fn run(
    session: Session,
    dispatcher: &Dispatcher,
    events: &Receiver<Event>,
    tick_rate: Duration,
) -> Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, session, dispatcher, events, tick_rate);

    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut session: Session,
    dispatcher: &Dispatcher,
    events: &Receiver<Event>,
    tick_rate: Duration,
) -> Result<()> {
    let size = terminal.size()?;
    session = step(
        session,
        Event::Resize {
            width: size.width,
            height: size.height,
        },
        dispatcher,
    );
    let mut last_tick = Instant::now();

    while !session.should_quit {
        terminal.draw(|frame| draw(frame, &session))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            match event::read()? {
                TermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                    session = step(session, Event::Key(key), dispatcher);
                }
                TermEvent::Resize(width, height) => {
                    session = step(session, Event::Resize { width, height }, dispatcher);
                }
                _ => {}
            }
        }

        while let Ok(event) = events.try_recv() {
            session = step(session, event, dispatcher);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
            session = step(session, Event::Tick, dispatcher);
        }
    }

    tracing::info!("session ended");
    Ok(())
}

fn step(session: Session, event: Event, dispatcher: &Dispatcher) -> Session {
    let (session, commands) = session.update(event);
    dispatcher.dispatch_all(commands);
    session
}

/// Paints the whole frame from the session. Reads nothing else.
pub fn draw(frame: &mut Frame<'_>, session: &Session) {
    let area = frame.size();
    frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), area);

    if let Some(error) = &session.error {
        draw_error(frame, area, error);
        return;
    }

    match &session.mode {
        Mode::Loading => draw_splash(frame, area, session.spinner_frame),
        Mode::Feed => draw_feed(frame, area, session),
        Mode::PostDetail(detail) => draw_detail(frame, area, session, detail),
        Mode::CreatePost(composer) => {
            let subtitle = match composer.purpose() {
                Purpose::Post { community } => Some(format!("Submolt: m/{community}")),
                _ => None,
            };
            draw_composer(frame, area, " NEW POST ", subtitle, composer, session);
        }
        Mode::CreateComment { detail, composer } => {
            let subtitle = Some(format!("Replying to: {}", detail.post.title));
            draw_composer(frame, area, " ADD COMMENT ", subtitle, composer, session);
        }
        Mode::Search(composer) => draw_composer(frame, area, " SEARCH ", None, composer, session),
        Mode::Register(Registration::Editing(composer)) => {
            draw_composer(frame, area, " WELCOME TO MOLTBOOK ", None, composer, session)
        }
        Mode::Register(Registration::Success(agent)) => {
            draw_registered(frame, area, agent, session.message.as_deref())
        }
        Mode::Profile(profile) => draw_profile(frame, area, session, profile),
    }
}

fn draw_error(frame: &mut Frame<'_>, area: Rect, error: &ErrorBanner) {
    let error_title = Style::default()
        .fg(COLOR_TEXT_PRIMARY)
        .bg(COLOR_ERROR)
        .add_modifier(Modifier::BOLD);
    let mut lines = vec![
        Line::from(Span::styled(" ERROR ", error_title)),
        Line::default(),
        Line::from(Span::styled(
            error.message.clone(),
            Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
        )),
    ];
    if let Some(wait) = error.retry_after {
        lines.push(Line::from(Span::styled(
            format!("You can retry in {}", humantime::format_duration(wait)),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Press 'r' to retry • esc to go back • 'q' to quit",
        help_style(),
    )));
    frame.render_widget(
        Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_splash(frame: &mut Frame<'_>, area: Rect, spinner_frame: usize) {
    let lines = vec![
        Line::default(),
        Line::default(),
        Line::from(Span::styled(
            format!("   {} Loading Moltbook...", spinner(spinner_frame)),
            Style::default().fg(COLOR_ACCENT),
        )),
        Line::from(Span::styled(
            "   Please wait, AI swarms are busy...",
            help_style(),
        )),
    ];
    frame.render_widget(Paragraph::new(Text::from(lines)), area);
}

/// Splits `area` into a fixed header, the viewport, a help line and the
/// status line. `help` of zero skips the help row.
fn chunks(area: Rect, header: u16, help: u16) -> [Rect; 4] {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(header),
            Constraint::Min(0),
            Constraint::Length(help),
            Constraint::Length(layout::FOOTER_HEIGHT),
        ])
        .split(area);
    [parts[0], parts[1], parts[2], parts[3]]
}

fn title_bar(label: &str, title: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(label.to_string(), title_style()),
        Span::raw("  "),
        Span::styled(
            title.to_string(),
            Style::default()
                .fg(COLOR_PRIMARY)
                .add_modifier(Modifier::BOLD),
        ),
    ])
}

fn status_line(session: &Session, idle: Option<String>) -> Line<'static> {
    match (&session.message, idle) {
        (Some(message), _) => Line::from(Span::styled(
            format!("• {message}"),
            Style::default().fg(COLOR_ACCENT),
        )),
        (None, Some(idle)) => Line::from(Span::styled(idle, help_style())),
        (None, None) => Line::default(),
    }
}

fn draw_feed(frame: &mut Frame<'_>, area: Rect, session: &Session) {
    let [header, body, _, footer] = chunks(area, layout::FEED_HEADER_HEIGHT, 0);
    let feed = &session.feed;

    let title = match &session.agent {
        Some(agent) => format!("{} · {} ({} karma)", feed.title(), agent.name, agent.karma),
        None => feed.title(),
    };
    let header_lines = vec![
        title_bar(" MOLTBOOK ", &title),
        Line::from(Span::styled(FEED_HELP, help_style())),
    ];
    frame.render_widget(Paragraph::new(Text::from(header_lines)), header);
    frame.render_widget(
        Paragraph::new(Text::from(feed.viewport.visible_lines().to_vec())),
        body,
    );

    let idle = if feed.cursor.all_loaded() && !feed.posts.is_empty() {
        Some(format!("{} posts • end of feed", feed.posts.len()))
    } else {
        feed.cursor.last_error().map(str::to_string)
    };
    frame.render_widget(Paragraph::new(status_line(session, idle)), footer);
}

fn draw_detail(frame: &mut Frame<'_>, area: Rect, session: &Session, detail: &DetailState) {
    let header_lines = detail.header(&session.upvoted, area.width);
    let header_height = u16::try_from(header_lines.len()).unwrap_or(area.height);
    let [header, body, help, footer] = chunks(area, header_height, layout::DETAIL_HELP_HEIGHT);

    frame.render_widget(Paragraph::new(Text::from(header_lines)), header);
    frame.render_widget(
        Paragraph::new(Text::from(detail.viewport.visible_lines().to_vec())),
        body,
    );
    frame.render_widget(
        Paragraph::new(Span::styled(DETAIL_HELP, help_style())),
        help,
    );
    let idle = detail.cursor.last_error().map(str::to_string);
    frame.render_widget(Paragraph::new(status_line(session, idle)), footer);
}

fn draw_profile(frame: &mut Frame<'_>, area: Rect, session: &Session, profile: &ProfileState) {
    let [header, body, help, footer] = chunks(
        area,
        layout::PROFILE_HEADER_HEIGHT,
        layout::DETAIL_HELP_HEIGHT,
    );

    let title = Span::styled(format!(" PROFILE: {} ", profile.name), title_style());
    frame.render_widget(Paragraph::new(Line::from(title)), header);

    if profile.is_loading() {
        let loading = Line::from(Span::styled(
            format!("   {} Loading profile...", spinner(session.spinner_frame)),
            Style::default().fg(COLOR_ACCENT),
        ));
        frame.render_widget(Paragraph::new(loading), body);
    } else {
        frame.render_widget(
            Paragraph::new(Text::from(profile.viewport.visible_lines().to_vec())),
            body,
        );
    }
    frame.render_widget(
        Paragraph::new(Span::styled(PROFILE_HELP, help_style())),
        help,
    );
    let idle = profile
        .is_deleting()
        .then(|| format!("{} Deleting...", spinner(session.spinner_frame)));
    frame.render_widget(Paragraph::new(status_line(session, idle)), footer);
}

fn draw_composer(
    frame: &mut Frame<'_>,
    area: Rect,
    title: &str,
    subtitle: Option<String>,
    composer: &Composer,
    session: &Session,
) {
    let mut lines = vec![Line::from(Span::styled(title.to_string(), title_style()))];
    lines.push(Line::default());
    if let Some(subtitle) = subtitle {
        lines.push(Line::from(Span::styled(
            subtitle,
            Style::default().fg(COLOR_ACCENT),
        )));
        lines.push(Line::default());
    }
    for step in composer.steps().iter().take(composer.current_step()) {
        lines.push(Line::from(vec![
            Span::styled(
                format!("{} ", step.prompt),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ),
            Span::styled(step.value.clone(), Style::default().fg(COLOR_ACCENT)),
        ]));
    }
    if let Some(step) = composer.step() {
        lines.push(Line::from(Span::styled(
            step.prompt,
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        )));
    }

    let prompt_height = u16::try_from(lines.len()).unwrap_or(area.height);
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(prompt_height),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);
    frame.render_widget(Paragraph::new(Text::from(lines)), parts[0]);

    let input = if composer.input().is_empty() {
        Span::styled(
            composer.step().map(|step| step.placeholder).unwrap_or_default(),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )
    } else {
        Span::styled(
            composer.input().to_string(),
            Style::default().fg(COLOR_TEXT_PRIMARY),
        )
    };
    let border = if composer.is_submitting() {
        COLOR_TEXT_SECONDARY
    } else {
        COLOR_PRIMARY
    };
    frame.render_widget(
        Paragraph::new(Line::from(input)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        ),
        parts[1],
    );

    let help = if composer.is_submitting() {
        Span::styled(
            format!("{} Submitting...", spinner(session.spinner_frame)),
            Style::default().fg(COLOR_ACCENT),
        )
    } else {
        Span::styled(COMPOSER_HELP, help_style())
    };
    frame.render_widget(Paragraph::new(help), parts[2]);
    frame.render_widget(Paragraph::new(status_line(session, None)), parts[3]);

    if !composer.is_submitting() {
        let typed = u16::try_from(UnicodeWidthStr::width(composer.input())).unwrap_or(u16::MAX);
        let max_x = parts[1].right().saturating_sub(2);
        frame.set_cursor((parts[1].x + 1).saturating_add(typed).min(max_x), parts[1].y + 1);
    }
}

fn draw_registered(frame: &mut Frame<'_>, area: Rect, agent: &Agent, message: Option<&str>) {
    let accent = Style::default().fg(COLOR_ACCENT);
    let mut lines = vec![
        Line::from(Span::styled(" REGISTRATION SUCCESSFUL! ", title_style())),
        Line::default(),
        Line::from(Span::styled(
            format!("Your agent {} has been registered.", agent.name),
            Style::default().fg(COLOR_SUCCESS),
        )),
        Line::from(vec![
            Span::raw("API Key: "),
            Span::styled(agent.api_key.clone().unwrap_or_default(), accent),
        ]),
        Line::default(),
        Line::from(Span::styled(
            "IMPORTANT: SAVE YOUR API KEY!",
            Style::default()
                .fg(COLOR_PRIMARY)
                .add_modifier(Modifier::BOLD),
        )),
    ];
    if let Some(claim_url) = &agent.claim_url {
        lines.push(Line::default());
        lines.push(Line::from(
            "To activate your agent, your human needs to claim it here:",
        ));
        lines.push(Line::from(Span::styled(
            claim_url.clone(),
            accent.add_modifier(Modifier::UNDERLINED),
        )));
    }
    if let Some(code) = &agent.verification_code {
        lines.push(Line::from(vec![
            Span::raw("Verification code: "),
            Span::styled(code.clone(), accent),
        ]));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "enter: go to the feed • y: copy API key • q: quit",
        help_style(),
    )));
    if let Some(message) = message {
        lines.push(Line::from(Span::styled(format!("• {message}"), accent)));
    }
    frame.render_widget(
        Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Post;
    use crate::credentials::{Credential, CredentialError};
    use crate::dispatch::Command;
    use crate::session::Settings;
    use ratatui::backend::TestBackend;

    fn render(session: &Session) -> String {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| draw(frame, session)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn resized(session: Session) -> Session {
        session
            .update(Event::Resize {
                width: 80,
                height: 24,
            })
            .0
    }

    #[test]
    fn loading_shows_splash() {
        let session = resized(Session::new(Settings::default()));
        assert!(render(&session).contains("Loading Moltbook..."));
    }

    #[test]
    fn feed_renders_cards() {
        let session = resized(Session::new(Settings::default()));
        let (session, commands) = session.update(Event::CredentialLoaded(Ok(Credential {
            api_key: "k".into(),
            agent_name: "crab".into(),
        })));
        let request = commands
            .into_iter()
            .find_map(|command| match command {
                Command::FetchFeed(request) => Some(request),
                _ => None,
            })
            .unwrap();
        let post = Post {
            id: "p1".into(),
            title: "Molting season".into(),
            ..Post::default()
        };
        let (session, _) = session.update(Event::FeedPage {
            request,
            result: Ok(vec![post]),
        });
        let (session, _) = session.update(Event::SelfLoaded(Ok(Agent {
            name: "crab".into(),
            karma: 42,
            ..Agent::default()
        })));

        let screen = render(&session);
        assert!(screen.contains("MOLTBOOK"));
        assert!(screen.contains("crab (42 karma)"));
        assert!(screen.contains("Molting season"));
    }

    #[test]
    fn error_replaces_the_view() {
        let session = resized(Session::new(Settings::default()));
        let (session, _) = session.update(Event::CredentialLoaded(Err(CredentialError::Io(
            "permission denied".into(),
        ))));
        let screen = render(&session);
        assert!(screen.contains("ERROR"));
        assert!(screen.contains("permission denied"));
        assert!(screen.contains("Press 'r' to retry"));
    }

    #[test]
    fn registration_prompts_for_a_name() {
        let session = resized(Session::new(Settings::default()));
        let (session, _) = session.update(Event::CredentialLoaded(Err(CredentialError::NotFound(
            "none".into(),
        ))));
        let screen = render(&session);
        assert!(screen.contains("WELCOME TO MOLTBOOK"));
        assert!(screen.contains("name your AI agent"));
    }
}
