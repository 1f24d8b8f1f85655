mod cards;
mod theme;

use std::cell::Cell;
use std::collections::HashMap;
use std::io::{self, Stdout};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tracing::{debug, info, warn};

use crate::api::{self, Channel, MediaItem, MediaPost, User};
use crate::browser::{self, FetchRequest, MediaBrowser, MediaKind, ViewMode};
use crate::carousel::{self, Carousel, Content};
use crate::config;
use crate::data::{ChannelService, MediaService};
use crate::forms::{ForgotPasswordForm, Form, FormField, LoginField, LoginForm, RegisterForm};
use crate::loader::{self, KeywordLoader, KeywordState, LoaderEvent};
use crate::session::{self, SessionError};
use crate::toast::{Toast, ToastKind, Toasts};

use cards::{CardSpec, CARD_HEIGHT, CARD_STRIDE};
use theme::Palette;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TICK_RATE: Duration = Duration::from_millis(120);
const ANIMATION_FRAME: Duration = Duration::from_millis(30);
const SIDEBAR_WIDTH: u16 = 24;
const TRENDING_LIMIT: usize = 10;
const NOTICE_TTL: Duration = Duration::from_secs(3);

const AUTH_REQUIRED_TITLE: &str = "Authentication Required";
const AUTH_REQUIRED_BODY: &str =
    "You must be logged in to access the dashboard. Redirecting to login page...";
const TRENDING_FAILED_MESSAGE: &str = "Failed to load trending Reddit channels";
const RESET_SENT_MESSAGE: &str = "Password reset link sent! Check your email for instructions.";

#[derive(Clone)]
pub struct Options {
    pub session: Arc<session::Manager>,
    pub channels: Arc<dyn ChannelService>,
    pub media: Arc<dyn MediaService>,
    pub feed: config::FeedConfig,
    pub browser: config::BrowserConfig,
    pub ui: config::UIConfig,
    pub status_message: String,
    pub settings: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Login,
    Register,
    ForgotPassword,
    Dashboard,
    Media,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SidebarItem {
    Home,
    Browse,
    Trending,
    Channels,
    Categories,
    Settings,
    Logout,
}

const SIDEBAR_ITEMS: [SidebarItem; 7] = [
    SidebarItem::Home,
    SidebarItem::Browse,
    SidebarItem::Trending,
    SidebarItem::Channels,
    SidebarItem::Categories,
    SidebarItem::Settings,
    SidebarItem::Logout,
];

impl SidebarItem {
    fn label(self) -> &'static str {
        match self {
            SidebarItem::Home => "Home",
            SidebarItem::Browse => "Browse Content",
            SidebarItem::Trending => "Trending",
            SidebarItem::Channels => "Channels",
            SidebarItem::Categories => "Categories",
            SidebarItem::Settings => "Settings",
            SidebarItem::Logout => "Log out",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            SidebarItem::Home => "⌂",
            SidebarItem::Browse => "▶",
            SidebarItem::Trending => "↗",
            SidebarItem::Channels => "☰",
            SidebarItem::Categories => "◆",
            SidebarItem::Settings => "⚙",
            SidebarItem::Logout => "⏻",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserMenuItem {
    Settings,
    Logout,
}

const USER_MENU_ITEMS: [UserMenuItem; 2] = [UserMenuItem::Settings, UserMenuItem::Logout];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DashFocus {
    Sidebar,
    Sections,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Section {
    Trending,
    KeywordsError(String),
    Keyword(String),
    Sentinel,
}

impl Section {
    fn height(&self) -> u16 {
        match self {
            Section::Trending | Section::Keyword(_) => CARD_HEIGHT + 2,
            Section::KeywordsError(_) => 3,
            Section::Sentinel => 2,
        }
    }

    fn is_carousel(&self) -> bool {
        matches!(self, Section::Trending | Section::Keyword(_))
    }
}

#[derive(Debug, Default)]
struct CarouselRow {
    carousel: Carousel,
    selected: usize,
}

impl CarouselRow {
    fn loading() -> Self {
        Self {
            carousel: Carousel::with_state(true, None),
            selected: 0,
        }
    }

    fn select(&mut self, delta: i32, len: usize) {
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = (self.selected as i64 + i64::from(delta)).clamp(0, len as i64 - 1);
        self.selected = next as usize;
        let (start, end) = cards::card_span(self.selected);
        self.carousel.reveal(start, end);
    }
}

#[derive(Debug, Default)]
struct SearchState {
    query: String,
    results: Vec<MediaItem>,
    pending: Option<u64>,
    selected: usize,
}

impl SearchState {
    fn active(&self) -> bool {
        !self.query.trim().is_empty()
    }
}

struct Notice {
    kind: ToastKind,
    title: String,
    body: String,
    expires_at: Option<Instant>,
}

struct Dashboard {
    trending: Vec<Channel>,
    trending_row: CarouselRow,
    loader: KeywordLoader,
    rows: HashMap<String, CarouselRow>,
    search: SearchState,
    focus: DashFocus,
    sidebar_index: usize,
    selected_section: usize,
    section_offset: Cell<usize>,
    sentinel_visible: Cell<bool>,
    result_columns: Cell<usize>,
    user_menu: Option<usize>,
    settings_open: bool,
    pending_trending: Option<u64>,
    pending_keywords: Option<u64>,
}

impl Dashboard {
    fn new(batch_size: usize) -> Self {
        Self {
            trending: Vec::new(),
            trending_row: CarouselRow::loading(),
            loader: KeywordLoader::new(batch_size),
            rows: HashMap::new(),
            search: SearchState::default(),
            focus: DashFocus::Sections,
            sidebar_index: 0,
            selected_section: 0,
            section_offset: Cell::new(0),
            sentinel_visible: Cell::new(false),
            result_columns: Cell::new(1),
            user_menu: None,
            settings_open: false,
            pending_trending: None,
            pending_keywords: None,
        }
    }

    fn sections(&self) -> Vec<Section> {
        let mut sections = vec![Section::Trending];
        if let Some(message) = self.loader.keywords_error() {
            sections.push(Section::KeywordsError(message.to_string()));
        }
        for keyword in self.loader.keywords() {
            if !matches!(self.loader.state(keyword), Some(KeywordState::Pending) | None) {
                sections.push(Section::Keyword(keyword.clone()));
            }
        }
        if self.loader.has_unloaded() {
            sections.push(Section::Sentinel);
        }
        sections
    }

    fn is_loading(&self) -> bool {
        self.pending_trending.is_some()
            || self.pending_keywords.is_some()
            || self.loader.is_busy()
            || self.search.pending.is_some()
    }

    fn is_animating(&self) -> bool {
        self.trending_row.carousel.is_animating()
            || self.rows.values().any(|row| row.carousel.is_animating())
    }

    fn tick_animations(&mut self) -> bool {
        let mut moved = self.trending_row.carousel.tick();
        for row in self.rows.values_mut() {
            moved |= row.carousel.tick();
        }
        moved
    }

    fn row_mut(&mut self, section: &Section) -> Option<(&mut CarouselRow, usize)> {
        match section {
            Section::Trending => Some((&mut self.trending_row, self.trending.len())),
            Section::Keyword(keyword) => {
                let len = self
                    .loader
                    .entry(keyword)
                    .map(|entry| entry.data.len())
                    .unwrap_or(0);
                Some((self.rows.entry(keyword.clone()).or_default(), len))
            }
            _ => None,
        }
    }

    fn selected_channel(&self) -> Option<&Channel> {
        if self.search.active() {
            return self.search.results.get(self.search.selected);
        }
        let sections = self.sections();
        match sections.get(self.selected_section)? {
            Section::Trending => self.trending.get(self.trending_row.selected),
            Section::Keyword(keyword) => {
                let selected = self.rows.get(keyword).map(|row| row.selected).unwrap_or(0);
                self.loader.entry(keyword)?.data.get(selected)
            }
            _ => None,
        }
    }
}

struct MediaView {
    browser: MediaBrowser,
    probe_cancel: Option<Arc<AtomicBool>>,
    grid_columns: Cell<usize>,
    row_offset: Cell<usize>,
}

impl MediaView {
    fn cancel_probes(&mut self) {
        if let Some(flag) = self.probe_cancel.take() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

enum AsyncResponse {
    Login {
        result: Result<User, SessionError>,
    },
    Register {
        username: String,
        ok: bool,
    },
    Trending {
        request_id: u64,
        result: Result<Vec<Channel>>,
    },
    Keywords {
        request_id: u64,
        result: Result<Vec<String>>,
    },
    Loader(LoaderEvent),
    Search {
        request_id: u64,
        query: String,
        result: Result<Vec<MediaItem>>,
    },
    Media {
        request_id: u64,
        result: Result<Vec<MediaPost>>,
    },
    ImageProbe {
        url: String,
        ok: bool,
    },
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= TICK_RATE {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

fn is_ctrl(key: &KeyEvent, ch: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(ch)
}

fn edit_form<F: FormField>(form: &mut Form<F>, key: &KeyEvent) -> bool {
    if is_ctrl(key, 's') {
        form.toggle_reveal();
        return true;
    }
    if is_ctrl(key, 'u') {
        form.clear_active();
        return true;
    }
    match key.code {
        KeyCode::Tab | KeyCode::Down => form.next(),
        KeyCode::BackTab | KeyCode::Up => form.previous(),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            form.insert_char(ch)
        }
        _ => return false,
    }
    true
}

pub struct Model {
    screen: Screen,
    session: Arc<session::Manager>,
    channels: Arc<dyn ChannelService>,
    media: Arc<dyn MediaService>,
    feed: config::FeedConfig,
    browser_defaults: config::BrowserConfig,
    palette: Palette,
    settings: Vec<(String, String)>,
    login_form: LoginForm,
    register_form: RegisterForm,
    forgot_form: ForgotPasswordForm,
    notice: Option<Notice>,
    auth_pending: bool,
    dashboard: Dashboard,
    media_view: Option<MediaView>,
    toasts: Toasts,
    status_message: String,
    spinner: Spinner,
    needs_redraw: bool,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let mut model = Self {
            screen: Screen::Login,
            session: opts.session,
            channels: opts.channels,
            media: opts.media,
            dashboard: Dashboard::new(opts.feed.batch_size),
            feed: opts.feed,
            browser_defaults: opts.browser,
            palette: Palette::named(&opts.ui.theme),
            settings: opts.settings,
            login_form: LoginForm::default(),
            register_form: RegisterForm::default(),
            forgot_form: ForgotPasswordForm::default(),
            notice: None,
            auth_pending: false,
            media_view: None,
            toasts: Toasts::new(opts.ui.toast_ttl),
            status_message: opts.status_message,
            spinner: Spinner::new(),
            needs_redraw: true,
            response_tx,
            response_rx,
            next_request_id: 1,
        };
        model.open_dashboard();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        self.shutdown();
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
                self.after_draw();
            }

            let timeout = if self.is_animating() {
                ANIMATION_FRAME
            } else {
                TICK_RATE
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or_else(|| Duration::from_millis(16))
            };

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match self.handle_key(key) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {err}");
                            }
                        }
                        self.mark_dirty();
                    }
                } else {
                    self.mark_dirty();
                }
            }

            if self.poll_async() {
                self.mark_dirty();
            }

            if self.dashboard.tick_animations() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= TICK_RATE {
                last_tick = Instant::now();
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
                if self.expire_transients(Instant::now()) {
                    self.mark_dirty();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    fn is_loading(&self) -> bool {
        self.auth_pending
            || (self.screen == Screen::Dashboard && self.dashboard.is_loading())
            || self
                .media_view
                .as_ref()
                .map(|view| view.browser.is_loading())
                .unwrap_or(false)
    }

    fn is_animating(&self) -> bool {
        self.screen == Screen::Dashboard && self.dashboard.is_animating()
    }

    fn expire_transients(&mut self, now: Instant) -> bool {
        let mut changed = self.toasts.prune(now);
        if let Some(notice) = &self.notice {
            if notice.expires_at.map(|at| now >= at).unwrap_or(false) {
                self.notice = None;
                changed = true;
            }
        }
        changed
    }

    fn after_draw(&mut self) {
        if self.screen == Screen::Dashboard
            && !self.dashboard.search.active()
            && self.dashboard.sentinel_visible.get()
        {
            self.load_next_keywords();
        }
    }

    fn shutdown(&mut self) {
        self.dashboard.loader.cancel();
        if let Some(view) = self.media_view.as_mut() {
            view.cancel_probes();
        }
    }

    // Session flow

    fn open_dashboard(&mut self) {
        let Some(user) = self.session.user() else {
            self.screen = Screen::Login;
            self.login_form.focus(LoginField::Username);
            self.notice = Some(Notice {
                kind: ToastKind::Error,
                title: AUTH_REQUIRED_TITLE.to_string(),
                body: AUTH_REQUIRED_BODY.to_string(),
                expires_at: Some(Instant::now() + NOTICE_TTL),
            });
            return;
        };
        self.screen = Screen::Dashboard;
        self.notice = None;
        self.status_message = format!("Signed in as {}", user.user_name);
        self.reload_dashboard();
    }

    fn submit_login(&mut self) {
        if self.auth_pending {
            return;
        }
        let Some((username, password)) = self.login_form.submit() else {
            return;
        };
        self.session.clear_error();
        self.auth_pending = true;
        self.spinner.reset();
        self.status_message = format!("Signing in as {username}…");
        let tx = self.response_tx.clone();
        let session = self.session.clone();
        thread::spawn(move || {
            let result = session.login(&username, &password);
            let _ = tx.send(AsyncResponse::Login { result });
        });
    }

    fn submit_register(&mut self) {
        if self.auth_pending {
            return;
        }
        let Some(request) = self.register_form.submit() else {
            return;
        };
        self.auth_pending = true;
        self.spinner.reset();
        self.status_message = "Creating account…".to_string();
        let tx = self.response_tx.clone();
        let session = self.session.clone();
        thread::spawn(move || {
            let ok = session.register(&request);
            let _ = tx.send(AsyncResponse::Register {
                username: request.username.clone(),
                ok,
            });
        });
    }

    fn submit_forgot_password(&mut self) {
        if self.forgot_form.sent_to().is_some() {
            self.show_login();
            return;
        }
        if self.forgot_form.submit() {
            info!("password reset requested");
        }
    }

    fn show_login(&mut self) {
        self.session.clear_error();
        self.forgot_form.reset();
        self.screen = Screen::Login;
    }

    fn logout(&mut self) {
        self.dashboard.loader.reset();
        if let Some(mut view) = self.media_view.take() {
            view.cancel_probes();
        }
        self.session.logout();
        let mut fresh = Dashboard::new(self.feed.batch_size);
        std::mem::swap(&mut fresh.loader, &mut self.dashboard.loader);
        self.dashboard = fresh;
        self.login_form.reset();
        self.screen = Screen::Login;
        self.status_message = "Signed out.".to_string();
        self.toasts
            .push(Toast::info("Signed out", "Your session has been cleared."));
    }

    // Dashboard data

    fn reload_dashboard(&mut self) {
        self.dashboard.loader.reset();
        self.dashboard.rows.clear();
        self.dashboard.trending.clear();
        self.dashboard.trending_row = CarouselRow::loading();
        self.dashboard.selected_section = 0;
        self.dashboard.section_offset.set(0);
        self.request_trending();
        self.request_keywords();
    }

    fn request_trending(&mut self) {
        let request_id = self.next_id();
        self.dashboard.pending_trending = Some(request_id);
        let tx = self.response_tx.clone();
        let service = self.channels.clone();
        thread::spawn(move || {
            let result = service.popular_channels();
            let _ = tx.send(AsyncResponse::Trending { request_id, result });
        });
    }

    fn request_keywords(&mut self) {
        let request_id = self.next_id();
        self.dashboard.pending_keywords = Some(request_id);
        let tx = self.response_tx.clone();
        let service = self.channels.clone();
        thread::spawn(move || {
            let result = service.keywords();
            let _ = tx.send(AsyncResponse::Keywords { request_id, result });
        });
    }

    fn load_next_keywords(&mut self) {
        if let Some(batch) = self.dashboard.loader.on_sentinel_visible() {
            self.run_keyword_batch(batch);
        }
    }

    fn run_keyword_batch(&mut self, batch: loader::Batch) {
        debug!(batch = batch.id, keywords = ?batch.keywords, "starting keyword batch");
        let tx = self.response_tx.clone();
        loader::spawn_batch(
            self.channels.clone(),
            batch,
            self.feed.batch_delay,
            move |event| {
                let _ = tx.send(AsyncResponse::Loader(event));
            },
        );
    }

    fn update_search(&mut self) {
        let query = self.dashboard.search.query.trim().to_string();
        self.dashboard.search.selected = 0;
        if query.is_empty() {
            self.dashboard.search.results.clear();
            self.dashboard.search.pending = None;
            return;
        }
        let request_id = self.next_id();
        self.dashboard.search.pending = Some(request_id);
        let tx = self.response_tx.clone();
        let service = self.media.clone();
        thread::spawn(move || {
            let result = service.search_media(&query);
            let _ = tx.send(AsyncResponse::Search {
                request_id,
                query,
                result,
            });
        });
    }

    // Media browser

    fn open_channel(&mut self, handle: String) {
        if handle.trim().is_empty() {
            return;
        }
        let mut browser = MediaBrowser::new(
            handle,
            self.browser_defaults.default_time_frame,
            self.browser_defaults.default_limit,
        );
        let request = browser.begin_fetch();
        info!(subreddit = %request.subreddit, "opening media browser");
        self.media_view = Some(MediaView {
            browser,
            probe_cancel: None,
            grid_columns: Cell::new(1),
            row_offset: Cell::new(0),
        });
        self.screen = Screen::Media;
        self.spinner.reset();
        self.spawn_media_fetch(request);
    }

    fn close_media(&mut self) {
        if let Some(mut view) = self.media_view.take() {
            view.cancel_probes();
        }
        self.screen = Screen::Dashboard;
    }

    fn spawn_media_fetch(&mut self, request: FetchRequest) {
        if let Some(view) = self.media_view.as_mut() {
            view.cancel_probes();
        }
        let tx = self.response_tx.clone();
        let service = self.media.clone();
        thread::spawn(move || {
            let result =
                service.subreddit_media(&request.subreddit, request.limit, request.time_frame);
            let _ = tx.send(AsyncResponse::Media {
                request_id: request.request_id,
                result,
            });
        });
    }

    fn probe_images(&mut self) {
        let Some(view) = self.media_view.as_mut() else {
            return;
        };
        view.cancel_probes();
        let urls: Vec<String> = view
            .browser
            .items()
            .iter()
            .filter(|post| MediaKind::of(post) == MediaKind::Image && !post.url.is_empty())
            .map(|post| post.url.clone())
            .collect();
        if urls.is_empty() {
            return;
        }
        let cancel = Arc::new(AtomicBool::new(false));
        view.probe_cancel = Some(cancel.clone());
        let tx = self.response_tx.clone();
        let service = self.media.clone();
        thread::spawn(move || {
            for url in urls {
                if cancel.load(Ordering::SeqCst) {
                    return;
                }
                let ok = match service.probe_image(&url) {
                    Ok(()) => true,
                    Err(err) => {
                        debug!(url = %url, error = %format!("{err:#}"), "image probe failed");
                        false
                    }
                };
                if tx.send(AsyncResponse::ImageProbe { url, ok }).is_err() {
                    return;
                }
            }
        });
    }

    fn open_selected_post(&mut self) {
        let Some(post) = self
            .media_view
            .as_ref()
            .and_then(|view| view.browser.selected_item())
        else {
            return;
        };
        let url = if !post.url.is_empty() {
            post.url.clone()
        } else {
            format!("https://www.reddit.com{}", post.permalink)
        };
        match webbrowser::open(&url) {
            Ok(_) => {
                self.status_message = format!("Opened {url} in your browser.");
            }
            Err(err) => {
                warn!(url = %url, error = %err, "failed to open browser");
                self.status_message = format!("Failed to open {url}: {err}");
            }
        }
    }

    // Async plumbing

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Login { result } => {
                self.auth_pending = false;
                match result {
                    Ok(user) => {
                        self.login_form.reset();
                        self.toasts.push(Toast::success(
                            "Signed in",
                            format!("Welcome back, {}", greeting_name(&user)),
                        ));
                        self.open_dashboard();
                    }
                    Err(err) => {
                        self.status_message = err.to_string();
                    }
                }
            }
            AsyncResponse::Register { username, ok } => {
                self.auth_pending = false;
                if ok {
                    self.register_form.reset();
                    self.login_form.reset();
                    self.login_form.set(LoginField::Username, username);
                    self.login_form.focus(LoginField::Password);
                    self.screen = Screen::Login;
                    self.notice = Some(Notice {
                        kind: ToastKind::Success,
                        title: "Registration successful".to_string(),
                        body: "Your account has been created. Please sign in.".to_string(),
                        expires_at: None,
                    });
                    self.status_message = "Account created.".to_string();
                } else {
                    self.status_message = self
                        .session
                        .error()
                        .unwrap_or_else(|| session::REGISTER_FAILED_MESSAGE.to_string());
                }
            }
            AsyncResponse::Trending { request_id, result } => {
                if self.dashboard.pending_trending != Some(request_id) {
                    return;
                }
                self.dashboard.pending_trending = None;
                let row = &mut self.dashboard.trending_row;
                row.carousel.set_loading(false);
                match result {
                    Ok(channels) => {
                        self.dashboard.trending =
                            channels.into_iter().take(TRENDING_LIMIT).collect();
                        row.carousel.set_error(None);
                    }
                    Err(err) => {
                        warn!(error = %format!("{err:#}"), "trending channels unavailable");
                        self.dashboard.trending.clear();
                        let message = if api::is_unexpected_shape(&err) {
                            loader::INVALID_RESPONSE_MESSAGE
                        } else {
                            TRENDING_FAILED_MESSAGE
                        };
                        row.carousel.set_error(Some(message.to_string()));
                    }
                }
                row.selected = 0;
            }
            AsyncResponse::Keywords { request_id, result } => {
                if self.dashboard.pending_keywords != Some(request_id) {
                    return;
                }
                self.dashboard.pending_keywords = None;
                match result {
                    Ok(keywords) => {
                        if let Some(batch) = self.dashboard.loader.set_keywords(keywords) {
                            self.run_keyword_batch(batch);
                        }
                    }
                    Err(err) => {
                        warn!(error = %format!("{err:#}"), "keywords unavailable");
                        let message = if api::is_unexpected_shape(&err) {
                            loader::INVALID_RESPONSE_MESSAGE
                        } else {
                            loader::KEYWORDS_FAILED_MESSAGE
                        };
                        self.dashboard.loader.fail_keywords(message);
                    }
                }
            }
            AsyncResponse::Loader(event) => {
                if let Some(batch) = self.dashboard.loader.apply(event) {
                    self.run_keyword_batch(batch);
                }
            }
            AsyncResponse::Search {
                request_id,
                query,
                result,
            } => {
                if self.dashboard.search.pending != Some(request_id) {
                    return;
                }
                self.dashboard.search.pending = None;
                self.dashboard.search.selected = 0;
                match result {
                    Ok(items) => {
                        self.dashboard.search.results = items;
                    }
                    Err(err) => {
                        warn!(query = %query, error = %format!("{err:#}"), "search failed");
                        self.dashboard.search.results.clear();
                        let toast = if api::is_unexpected_shape(&err) {
                            Toast::error(
                                loader::INVALID_RESPONSE_MESSAGE,
                                "The server returned an unexpected response format",
                            )
                        } else {
                            Toast::error("Search failed", format!("Could not search for \"{query}\""))
                        };
                        self.toasts.push(toast);
                    }
                }
            }
            AsyncResponse::Media { request_id, result } => {
                let Some(view) = self.media_view.as_mut() else {
                    return;
                };
                if let Some(toast) = view.browser.apply_result(request_id, result) {
                    view.row_offset.set(0);
                    self.toasts.push(toast);
                    self.probe_images();
                }
            }
            AsyncResponse::ImageProbe { url, ok } => {
                if ok {
                    return;
                }
                if let Some(view) = self.media_view.as_mut() {
                    view.browser.mark_image_failed(&url);
                }
            }
        }
    }

    // Input

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if is_ctrl(&key, 'c') {
            return Ok(true);
        }
        match self.screen {
            Screen::Login => Ok(self.handle_login_key(key)),
            Screen::Register => {
                self.handle_register_key(key);
                Ok(false)
            }
            Screen::ForgotPassword => {
                self.handle_forgot_key(key);
                Ok(false)
            }
            Screen::Dashboard => Ok(self.handle_dashboard_key(key)),
            Screen::Media => {
                self.handle_media_key(key);
                Ok(false)
            }
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) -> bool {
        if is_ctrl(&key, 'n') {
            self.session.clear_error();
            self.register_form.reset();
            self.notice = None;
            self.screen = Screen::Register;
            return false;
        }
        if is_ctrl(&key, 'f') {
            self.session.clear_error();
            self.forgot_form.reset();
            self.notice = None;
            self.screen = Screen::ForgotPassword;
            return false;
        }
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Enter => self.submit_login(),
            _ => {
                edit_form(&mut self.login_form, &key);
            }
        }
        false
    }

    fn handle_register_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.show_login(),
            KeyCode::Enter => self.submit_register(),
            _ => {
                edit_form(&mut self.register_form, &key);
            }
        }
    }

    fn handle_forgot_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.show_login(),
            KeyCode::Enter => self.submit_forgot_password(),
            _ => {
                if self.forgot_form.sent_to().is_none() {
                    edit_form(&mut self.forgot_form.form, &key);
                }
            }
        }
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent) -> bool {
        if self.dashboard.settings_open {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                self.dashboard.settings_open = false;
            }
            return false;
        }
        if let Some(index) = self.dashboard.user_menu {
            self.handle_user_menu_key(index, key);
            return false;
        }
        if self.dashboard.focus == DashFocus::Search {
            self.handle_search_key(key);
            return false;
        }

        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('/') => {
                self.dashboard.focus = DashFocus::Search;
            }
            KeyCode::Char('u') => {
                self.dashboard.user_menu = Some(0);
            }
            KeyCode::Char('r') => {
                self.dashboard.search.query.clear();
                self.update_search();
                self.reload_dashboard();
                self.status_message = "Refreshing dashboard…".to_string();
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.dashboard.focus = match self.dashboard.focus {
                    DashFocus::Sidebar => DashFocus::Sections,
                    _ => DashFocus::Sidebar,
                };
            }
            KeyCode::Esc if self.dashboard.search.active() => {
                self.dashboard.search.query.clear();
                self.update_search();
            }
            _ => match self.dashboard.focus {
                DashFocus::Sidebar => self.handle_sidebar_key(key),
                _ if self.dashboard.search.active() => self.handle_results_key(key),
                _ => self.handle_sections_key(key),
            },
        }
        false
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) {
        let len = SIDEBAR_ITEMS.len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.dashboard.sidebar_index = (self.dashboard.sidebar_index + 1) % len;
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.dashboard.sidebar_index = (self.dashboard.sidebar_index + len - 1) % len;
            }
            KeyCode::Char('l') | KeyCode::Right => {
                self.dashboard.focus = DashFocus::Sections;
            }
            KeyCode::Enter => {
                let item = SIDEBAR_ITEMS[self.dashboard.sidebar_index.min(len - 1)];
                self.activate_sidebar(item);
            }
            _ => {}
        }
    }

    fn activate_sidebar(&mut self, item: SidebarItem) {
        match item {
            SidebarItem::Home | SidebarItem::Browse | SidebarItem::Trending => {
                self.dashboard.search.query.clear();
                self.update_search();
                self.dashboard.selected_section = 0;
                self.dashboard.focus = DashFocus::Sections;
            }
            SidebarItem::Channels | SidebarItem::Categories => {
                let sections = self.dashboard.sections();
                if let Some(index) = sections
                    .iter()
                    .position(|section| matches!(section, Section::Keyword(_)))
                {
                    self.dashboard.selected_section = index;
                }
                self.dashboard.focus = DashFocus::Sections;
            }
            SidebarItem::Settings => {
                self.dashboard.settings_open = true;
            }
            SidebarItem::Logout => self.logout(),
        }
    }

    fn handle_user_menu_key(&mut self, index: usize, key: KeyEvent) {
        let len = USER_MENU_ITEMS.len();
        match key.code {
            KeyCode::Esc | KeyCode::Char('u') | KeyCode::Char('q') => {
                self.dashboard.user_menu = None;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.dashboard.user_menu = Some((index + 1) % len);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.dashboard.user_menu = Some((index + len - 1) % len);
            }
            KeyCode::Enter => {
                self.dashboard.user_menu = None;
                match USER_MENU_ITEMS[index.min(len - 1)] {
                    UserMenuItem::Settings => self.dashboard.settings_open = true,
                    UserMenuItem::Logout => self.logout(),
                }
            }
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.dashboard.search.query.clear();
                self.update_search();
                self.dashboard.focus = DashFocus::Sections;
            }
            KeyCode::Enter | KeyCode::Down | KeyCode::Tab => {
                self.dashboard.focus = DashFocus::Sections;
            }
            KeyCode::Backspace => {
                self.dashboard.search.query.pop();
                self.update_search();
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.dashboard.search.query.push(ch);
                self.update_search();
            }
            _ => {}
        }
    }

    fn handle_results_key(&mut self, key: KeyEvent) {
        let len = self.dashboard.search.results.len();
        if len == 0 {
            return;
        }
        let columns = self.dashboard.result_columns.get().max(1) as i64;
        let delta: i64 = match key.code {
            KeyCode::Char('h') | KeyCode::Left => -1,
            KeyCode::Char('l') | KeyCode::Right => 1,
            KeyCode::Char('k') | KeyCode::Up => -columns,
            KeyCode::Char('j') | KeyCode::Down => columns,
            KeyCode::Enter => {
                if let Some(item) = self.dashboard.selected_channel() {
                    let handle = item.handle().to_string();
                    self.open_channel(handle);
                }
                return;
            }
            _ => return,
        };
        let current = self.dashboard.search.selected as i64;
        self.dashboard.search.selected = (current + delta).clamp(0, len as i64 - 1) as usize;
    }

    fn handle_sections_key(&mut self, key: KeyEvent) {
        let sections = self.dashboard.sections();
        if sections.is_empty() {
            return;
        }
        let current = self.dashboard.selected_section.min(sections.len() - 1);
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.dashboard.selected_section = (current + 1).min(sections.len() - 1);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.dashboard.selected_section = current.saturating_sub(1);
            }
            KeyCode::Char('g') | KeyCode::Home => {
                self.dashboard.selected_section = 0;
            }
            KeyCode::Char('G') | KeyCode::End => {
                self.dashboard.selected_section = sections.len() - 1;
            }
            KeyCode::Char('h') | KeyCode::Left => {
                if let Some((row, len)) = self.dashboard.row_mut(&sections[current]) {
                    row.select(-1, len);
                }
            }
            KeyCode::Char('l') | KeyCode::Right => {
                if let Some((row, len)) = self.dashboard.row_mut(&sections[current]) {
                    row.select(1, len);
                }
            }
            KeyCode::Char('[') => {
                if let Some((row, _)) = self.dashboard.row_mut(&sections[current]) {
                    row.carousel.scroll(carousel::Direction::Left);
                }
            }
            KeyCode::Char(']') => {
                if let Some((row, _)) = self.dashboard.row_mut(&sections[current]) {
                    row.carousel.scroll(carousel::Direction::Right);
                }
            }
            KeyCode::Enter => {
                if let Some(channel) = self.dashboard.selected_channel() {
                    let handle = channel.handle().to_string();
                    self.open_channel(handle);
                }
            }
            _ => {}
        }
    }

    fn handle_media_key(&mut self, key: KeyEvent) {
        let Some(view) = self.media_view.as_mut() else {
            self.screen = Screen::Dashboard;
            return;
        };
        let columns = view.grid_columns.get().max(1) as i32;
        let grid = view.browser.view() == ViewMode::Grid;
        let mut request = None;
        match key.code {
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => {
                self.close_media();
                return;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                view.browser.select_next(if grid { columns } else { 1 })
            }
            KeyCode::Char('k') | KeyCode::Up => {
                view.browser.select_next(if grid { -columns } else { -1 })
            }
            KeyCode::Char('l') | KeyCode::Right => view.browser.select_next(1),
            KeyCode::Char('h') | KeyCode::Left => view.browser.select_next(-1),
            KeyCode::Char('v') => view.browser.toggle_view(),
            KeyCode::Char('t') => {
                let frame = view.browser.time_frame().cycle(1);
                request = view.browser.set_time_frame(frame);
            }
            KeyCode::Char('T') => {
                let frame = view.browser.time_frame().cycle(-1);
                request = view.browser.set_time_frame(frame);
            }
            KeyCode::Char('n') => {
                let limit = view.browser.limit().cycle(1);
                request = view.browser.set_limit(limit);
            }
            KeyCode::Char('N') => {
                let limit = view.browser.limit().cycle(-1);
                request = view.browser.set_limit(limit);
            }
            KeyCode::Char('r') => {
                request = Some(view.browser.begin_fetch());
            }
            KeyCode::Enter | KeyCode::Char('o') => {
                self.open_selected_post();
                return;
            }
            _ => {}
        }
        if let Some(request) = request {
            self.spinner.reset();
            self.spawn_media_fetch(request);
        }
    }

    // Drawing

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        let palette = self.palette;
        frame.render_widget(Block::default().style(Style::default().bg(palette.bg)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(format!(" PentyFlix · {}", status_text.trim())).style(
            Style::default()
                .fg(palette.text_primary)
                .bg(palette.panel_focused_bg)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        match self.screen {
            Screen::Login => self.draw_login(frame, layout[1]),
            Screen::Register => self.draw_register(frame, layout[1]),
            Screen::ForgotPassword => self.draw_forgot(frame, layout[1]),
            Screen::Dashboard => self.draw_dashboard(frame, layout[1]),
            Screen::Media => self.draw_media(frame, layout[1]),
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(palette.text_secondary)
                    .bg(palette.panel_bg)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);

        self.draw_toasts(frame, layout[1]);
    }

    fn panel_block(&self, title: &str, focused: bool) -> Block<'static> {
        let palette = &self.palette;
        let border_style = if focused {
            Style::default().fg(palette.border_focused)
        } else {
            Style::default().fg(palette.border_idle)
        };
        let title_style = if focused {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text_secondary)
        };
        Block::default()
            .title(Span::styled(title.to_string(), title_style))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(palette.panel_bg))
            .padding(Padding::horizontal(1))
    }

    fn notice_lines(&self, notice: &Notice) -> Vec<Line<'static>> {
        let color = match notice.kind {
            ToastKind::Success => self.palette.success,
            ToastKind::Error => self.palette.error,
            ToastKind::Info => self.palette.accent,
        };
        vec![
            Line::from(Span::styled(
                notice.title.clone(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                notice.body.clone(),
                Style::default().fg(color),
            )),
            Line::default(),
        ]
    }

    fn form_lines<F: FormField>(&self, form: &Form<F>) -> Vec<Line<'static>> {
        let palette = &self.palette;
        let mut lines = Vec::new();
        for field in F::ORDER {
            let focused = form.active() == *field;
            let label_style = if focused {
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.text_secondary)
            };
            let value_style = if focused {
                Style::default()
                    .fg(palette.text_primary)
                    .bg(palette.panel_selected_bg)
            } else {
                Style::default()
                    .fg(palette.text_primary)
                    .bg(palette.panel_focused_bg)
            };
            lines.push(Line::from(Span::styled(field.title().to_string(), label_style)));
            let mut value = form.display_value(*field);
            if focused {
                value.push('█');
            }
            lines.push(Line::from(Span::styled(format!(" {value} "), value_style)));
            if let Some(error) = form.error(*field) {
                lines.push(Line::from(Span::styled(
                    error.to_string(),
                    Style::default().fg(palette.error),
                )));
            }
            lines.push(Line::default());
        }
        lines
    }

    fn draw_auth_panel(&self, frame: &mut Frame<'_>, area: Rect, title: &str, body: Text<'static>) {
        let popup = centered_rect(60, 90, area);
        frame.render_widget(Clear, popup);
        let panel = Paragraph::new(body)
            .block(self.panel_block(title, true).padding(Padding::uniform(1)))
            .wrap(Wrap { trim: false });
        frame.render_widget(panel, popup);
    }

    fn heading_lines(&self, title: &str, subtitle: &str) -> Vec<Line<'static>> {
        vec![
            Line::from(Span::styled(
                title.to_string(),
                Style::default()
                    .fg(self.palette.text_primary)
                    .add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center),
            Line::from(Span::styled(
                subtitle.to_string(),
                Style::default().fg(self.palette.text_secondary),
            ))
            .alignment(Alignment::Center),
            Line::default(),
        ]
    }

    fn session_error_lines(&self) -> Vec<Line<'static>> {
        match self.session.error() {
            Some(error) => vec![
                Line::from(Span::styled(
                    error,
                    Style::default()
                        .fg(self.palette.error)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::default(),
            ],
            None => Vec::new(),
        }
    }

    fn pending_line(&self, label: &str) -> Line<'static> {
        Line::from(Span::styled(
            format!("{} {label}", self.spinner.frame()),
            Style::default().fg(self.palette.accent),
        ))
    }

    fn draw_login(&self, frame: &mut Frame<'_>, area: Rect) {
        let mut lines = self.heading_lines("Welcome to PentyFlix", "Sign in to your account");
        if let Some(notice) = &self.notice {
            lines.extend(self.notice_lines(notice));
        }
        lines.extend(self.session_error_lines());
        lines.extend(self.form_lines(&self.login_form));
        if self.auth_pending {
            lines.push(self.pending_line("Signing in..."));
        }
        self.draw_auth_panel(frame, area, "Sign in", Text::from(lines));
    }

    fn draw_register(&self, frame: &mut Frame<'_>, area: Rect) {
        let mut lines = self.heading_lines(
            "Create an account",
            "Enter your details below to create your account",
        );
        lines.extend(self.session_error_lines());
        lines.extend(self.form_lines(&self.register_form));
        if self.auth_pending {
            lines.push(self.pending_line("Creating account..."));
        }
        self.draw_auth_panel(frame, area, "Register", Text::from(lines));
    }

    fn draw_forgot(&self, frame: &mut Frame<'_>, area: Rect) {
        let mut lines = self.heading_lines(
            "Forgot your password?",
            "Enter your email address and we'll send you a link to reset your password",
        );
        match self.forgot_form.sent_to() {
            Some(email) => {
                lines.push(Line::from(Span::styled(
                    RESET_SENT_MESSAGE,
                    Style::default()
                        .fg(self.palette.success)
                        .add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(Span::styled(
                    format!("Sent to {email}"),
                    Style::default().fg(self.palette.text_secondary),
                )));
            }
            None => lines.extend(self.form_lines(&self.forgot_form.form)),
        }
        self.draw_auth_panel(frame, area, "Reset password", Text::from(lines));
    }

    fn draw_dashboard(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
            .split(area);
        self.draw_sidebar(frame, columns[0]);

        let main = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(columns[1]);
        self.draw_header(frame, main[0]);

        if self.dashboard.search.active() {
            self.dashboard.sentinel_visible.set(false);
            self.draw_search_results(frame, main[1]);
        } else {
            let body = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(0)])
                .split(main[1]);
            self.draw_welcome(frame, body[0]);
            self.draw_sections(frame, body[1]);
        }

        if let Some(index) = self.dashboard.user_menu {
            self.draw_user_menu(frame, main[1], index);
        }
        if self.dashboard.settings_open {
            self.draw_settings(frame, area);
        }
    }

    fn draw_sidebar(&self, frame: &mut Frame<'_>, area: Rect) {
        let focused = self.dashboard.focus == DashFocus::Sidebar;
        let block = self.panel_block("PentyFlix", focused);
        let items: Vec<ListItem> = SIDEBAR_ITEMS
            .iter()
            .map(|item| {
                let mut style = Style::default().fg(self.palette.text_primary);
                if *item == SidebarItem::Home {
                    style = style.fg(self.palette.accent).add_modifier(Modifier::BOLD);
                }
                if *item == SidebarItem::Logout {
                    style = style.fg(self.palette.error);
                }
                ListItem::new(Line::from(Span::styled(
                    format!("{} {}", item.icon(), item.label()),
                    style,
                )))
            })
            .collect();
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(if focused {
                    self.palette.panel_selected_bg
                } else {
                    self.palette.panel_focused_bg
                })
                .add_modifier(Modifier::BOLD),
        );
        let mut state = ListState::default().with_selected(Some(self.dashboard.sidebar_index));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect) {
        let user = self.session.user();
        let badge = user
            .as_ref()
            .map(|u| format!(" {} │ {} ▾ ", u.initials(), u.user_name))
            .unwrap_or_default();
        let badge_width = badge.chars().count() as u16 + 2;
        let parts = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(10), Constraint::Length(badge_width)])
            .split(area);

        let focused = self.dashboard.focus == DashFocus::Search;
        let query = &self.dashboard.search.query;
        let search_text = if query.is_empty() && !focused {
            Span::styled(
                "Search... (/)".to_string(),
                Style::default().fg(self.palette.text_secondary),
            )
        } else {
            let cursor = if focused { "█" } else { "" };
            Span::styled(
                format!("{query}{cursor}"),
                Style::default().fg(self.palette.text_primary),
            )
        };
        let search = Paragraph::new(Line::from(vec![Span::raw("⌕ "), search_text]))
            .block(self.panel_block("Search", focused));
        frame.render_widget(search, parts[0]);

        let menu_open = self.dashboard.user_menu.is_some();
        let avatar = Paragraph::new(Line::from(Span::styled(
            badge,
            Style::default()
                .fg(self.palette.bg)
                .bg(self.palette.accent)
                .add_modifier(Modifier::BOLD),
        )))
        .block(self.panel_block("", menu_open).padding(Padding::zero()))
        .alignment(Alignment::Center);
        frame.render_widget(avatar, parts[1]);
    }

    fn draw_welcome(&self, frame: &mut Frame<'_>, area: Rect) {
        let name = self
            .session
            .user()
            .map(|user| greeting_name(&user))
            .unwrap_or_default();
        let text = Text::from(vec![
            Line::from(Span::styled(
                format!("Welcome back, {name}"),
                Style::default()
                    .fg(self.palette.text_primary)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Discover new movies and popular Reddit channels.",
                Style::default().fg(self.palette.text_secondary),
            )),
        ]);
        frame.render_widget(
            Paragraph::new(text).block(Block::default().padding(Padding::horizontal(1))),
            area,
        );
    }

    fn draw_sections(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let palette = self.palette;
        let spinner = self.spinner.frame();
        let sections = self.dashboard.sections();
        self.dashboard.sentinel_visible.set(false);
        if sections.is_empty() || area.height == 0 {
            return;
        }
        let selected = self.dashboard.selected_section.min(sections.len() - 1);
        self.dashboard.selected_section = selected;

        let mut offset = self.dashboard.section_offset.get().min(selected);
        while offset < selected {
            let used: u16 = sections[offset..=selected].iter().map(Section::height).sum();
            if used <= area.height {
                break;
            }
            offset += 1;
        }
        self.dashboard.section_offset.set(offset);

        let focus_sections = self.dashboard.focus == DashFocus::Sections;
        let bottom = area.y + area.height;
        let mut y = area.y;
        for (index, section) in sections.iter().enumerate().skip(offset) {
            if y >= bottom {
                break;
            }
            let height = section.height().min(bottom - y);
            let rect = Rect::new(area.x, y, area.width, height);
            let focused = focus_sections && index == selected && section.is_carousel();
            match section {
                Section::Trending => {
                    let cards: Vec<CardSpec> =
                        self.dashboard.trending.iter().map(cards::channel_card).collect();
                    draw_carousel_row(
                        frame,
                        rect,
                        "Trending Now",
                        &cards,
                        &mut self.dashboard.trending_row,
                        focused,
                        "No trending channels right now",
                        &palette,
                        spinner,
                    );
                }
                Section::Keyword(keyword) => {
                    let display = loader::display_keyword(keyword);
                    let (cards, loading, error) = match self.dashboard.loader.entry(keyword) {
                        Some(entry) => (
                            entry.data.iter().map(cards::channel_card).collect::<Vec<_>>(),
                            entry.loading,
                            entry.error.clone(),
                        ),
                        None => (Vec::new(), false, None),
                    };
                    let row = self.dashboard.rows.entry(keyword.clone()).or_default();
                    row.carousel.set_loading(loading);
                    row.carousel.set_error(error);
                    draw_carousel_row(
                        frame,
                        rect,
                        &format!("Popular {display} Channels"),
                        &cards,
                        row,
                        focused,
                        &format!("No channels found for {display}"),
                        &palette,
                        spinner,
                    );
                }
                Section::KeywordsError(message) => {
                    let panel = Paragraph::new(Span::styled(
                        message.clone(),
                        Style::default().fg(palette.error),
                    ))
                    .alignment(Alignment::Center)
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(Style::default().fg(palette.error)),
                    );
                    frame.render_widget(panel, rect);
                }
                Section::Sentinel => {
                    self.dashboard.sentinel_visible.set(true);
                    let line = Paragraph::new(Span::styled(
                        format!("{spinner} Loading more content..."),
                        Style::default().fg(palette.text_secondary),
                    ))
                    .alignment(Alignment::Center);
                    frame.render_widget(line, rect);
                }
            }
            y += height;
        }
    }

    fn draw_search_results(&self, frame: &mut Frame<'_>, area: Rect) {
        let palette = self.palette;
        let search = &self.dashboard.search;
        let block = self.panel_block("Search Results", self.dashboard.focus == DashFocus::Sections);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if search.results.is_empty() {
            let message = if search.pending.is_some() {
                format!("{} Searching...", self.spinner.frame())
            } else {
                format!("No results found for \"{}\"", search.query)
            };
            let empty = Paragraph::new(Span::styled(
                message,
                Style::default().fg(palette.text_secondary),
            ))
            .alignment(Alignment::Center);
            frame.render_widget(empty, inner);
            return;
        }

        let columns = usize::from(((inner.width + cards::CARD_GAP) / CARD_STRIDE).max(1));
        self.dashboard.result_columns.set(columns);
        let all: Vec<CardSpec> = search.results.iter().map(cards::media_card).collect();
        draw_card_grid(frame, inner, &all, search.selected, columns, None, &palette);
    }

    fn draw_user_menu(&self, frame: &mut Frame<'_>, area: Rect, selected: usize) {
        let Some(user) = self.session.user() else {
            return;
        };
        let width = 36.min(area.width);
        let mut lines = vec![
            Line::from(Span::styled(
                format!("[{}] {}", user.initials(), user.user_name),
                Style::default()
                    .fg(self.palette.text_primary)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                user.email.clone(),
                Style::default().fg(self.palette.text_secondary),
            )),
        ];
        if let Some(full_name) = user.full_name() {
            lines.push(Line::from(Span::styled(
                full_name,
                Style::default().fg(self.palette.text_secondary),
            )));
        }
        lines.push(Line::from("─".repeat(usize::from(width.saturating_sub(4)))));
        for (index, item) in USER_MENU_ITEMS.iter().enumerate() {
            let (label, color) = match item {
                UserMenuItem::Settings => ("⚙ Settings", self.palette.text_primary),
                UserMenuItem::Logout => ("⏻ Logout", self.palette.error),
            };
            let mut style = Style::default().fg(color);
            if index == selected {
                style = style
                    .bg(self.palette.panel_selected_bg)
                    .add_modifier(Modifier::BOLD);
            }
            lines.push(Line::from(Span::styled(label, style)));
        }
        let height = (lines.len() as u16 + 2).min(area.height);
        let popup = Rect::new(
            area.x + area.width.saturating_sub(width),
            area.y,
            width,
            height,
        );
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines).block(self.panel_block("Account", true)),
            popup,
        );
    }

    fn draw_settings(&self, frame: &mut Frame<'_>, area: Rect) {
        let popup = centered_rect(70, 60, area);
        frame.render_widget(Clear, popup);
        let label_width = self
            .settings
            .iter()
            .map(|(label, _)| label.chars().count())
            .max()
            .unwrap_or(0);
        let mut lines: Vec<Line<'static>> = self
            .settings
            .iter()
            .map(|(label, value)| {
                Line::from(vec![
                    Span::styled(
                        format!("{label:<label_width$}  "),
                        Style::default().fg(self.palette.text_secondary),
                    ),
                    Span::styled(value.clone(), Style::default().fg(self.palette.text_primary)),
                ])
            })
            .collect();
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Edit the config file or set PENTYFLIX_* variables, then restart.",
            Style::default()
                .fg(self.palette.text_secondary)
                .add_modifier(Modifier::ITALIC),
        )));
        frame.render_widget(
            Paragraph::new(lines)
                .block(self.panel_block("Settings", true).padding(Padding::uniform(1)))
                .wrap(Wrap { trim: false }),
            popup,
        );
    }

    fn draw_media(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(view) = self.media_view.as_ref() else {
            return;
        };
        let palette = &self.palette;
        let media = &view.browser;
        let block = self.panel_block(&format!("r/{}", media.subreddit()), true);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(0)])
            .split(inner);
        let filters = Line::from(vec![
            Span::styled("Time ", Style::default().fg(palette.text_secondary)),
            Span::styled(
                media.time_frame().label(),
                Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  ·  Limit ", Style::default().fg(palette.text_secondary)),
            Span::styled(
                media.limit().to_string(),
                Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  ·  View ", Style::default().fg(palette.text_secondary)),
            Span::styled(
                media.view().label(),
                Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
            ),
        ]);
        frame.render_widget(Paragraph::new(filters), parts[0]);
        let body = parts[1];

        if media.is_loading() {
            let loading = Paragraph::new(Span::styled(
                format!("{} Loading media...", self.spinner.frame()),
                Style::default().fg(palette.text_secondary),
            ))
            .alignment(Alignment::Center);
            frame.render_widget(loading, body);
            return;
        }
        if let Some(error) = media.error() {
            let text = Text::from(vec![
                Line::from(Span::styled(
                    "Error loading media",
                    Style::default().fg(palette.error).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(error.to_string(), Style::default().fg(palette.error))),
                Line::default(),
                Line::from(Span::styled(
                    "Press r to retry or Esc to go back.",
                    Style::default().fg(palette.text_secondary),
                )),
            ]);
            frame.render_widget(
                Paragraph::new(text)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true }),
                body,
            );
            return;
        }
        if media.items().is_empty() {
            let text = Text::from(vec![
                Line::from(Span::styled(
                    format!("No media found for r/{}", media.subreddit()),
                    Style::default().fg(palette.text_secondary),
                )),
                Line::from(Span::styled(
                    "Press r to refresh or Esc to go back.",
                    Style::default().fg(palette.text_secondary),
                )),
            ]);
            frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), body);
            return;
        }

        match media.view() {
            ViewMode::Grid => {
                let columns = usize::from(((body.width + cards::CARD_GAP) / CARD_STRIDE).max(1));
                view.grid_columns.set(columns);
                let all: Vec<CardSpec> = media
                    .items()
                    .iter()
                    .map(|post| cards::post_card(post, media))
                    .collect();
                draw_card_grid(
                    frame,
                    body,
                    &all,
                    media.selected(),
                    columns,
                    Some(&view.row_offset),
                    palette,
                );
            }
            ViewMode::List => {
                view.grid_columns.set(1);
                let items: Vec<ListItem> = media
                    .items()
                    .iter()
                    .map(|post| media_list_item(post, media, palette))
                    .collect();
                let list = List::new(items).highlight_style(
                    Style::default()
                        .bg(palette.panel_selected_bg)
                        .add_modifier(Modifier::BOLD),
                );
                let mut state = ListState::default().with_selected(Some(media.selected()));
                frame.render_stateful_widget(list, body, &mut state);
            }
        }
    }

    fn draw_toasts(&self, frame: &mut Frame<'_>, area: Rect) {
        if self.toasts.is_empty() {
            return;
        }
        let width = 44.min(area.width);
        let mut y = area.y;
        for toast in self.toasts.iter() {
            let height = 4;
            if y + height > area.y + area.height {
                break;
            }
            let rect = Rect::new(area.x + area.width.saturating_sub(width), y, width, height);
            let color = match toast.kind {
                ToastKind::Success => self.palette.success,
                ToastKind::Error => self.palette.error,
                ToastKind::Info => self.palette.accent,
            };
            frame.render_widget(Clear, rect);
            frame.render_widget(
                Paragraph::new(Span::styled(
                    toast.description.clone(),
                    Style::default().fg(self.palette.text_primary),
                ))
                .wrap(Wrap { trim: true })
                .block(
                    Block::default()
                        .title(Span::styled(
                            toast.title.clone(),
                            Style::default().fg(color).add_modifier(Modifier::BOLD),
                        ))
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(color))
                        .style(Style::default().bg(self.palette.panel_bg))
                        .padding(Padding::horizontal(1)),
                ),
                rect,
            );
            y += height;
        }
    }

    fn footer_text(&self) -> String {
        let parts: Vec<&str> = match self.screen {
            Screen::Login => vec![
                "Enter sign in",
                "Tab next field",
                "Ctrl-S show password",
                "Ctrl-N create account",
                "Ctrl-F forgot password",
                "Esc quit",
            ],
            Screen::Register => vec![
                "Enter create account",
                "Tab next field",
                "Ctrl-S show passwords",
                "Esc back to sign in",
            ],
            Screen::ForgotPassword => {
                if self.forgot_form.sent_to().is_some() {
                    vec!["Enter/Esc return to login"]
                } else {
                    vec!["Enter send reset link", "Esc back to login"]
                }
            }
            Screen::Dashboard => {
                if self.dashboard.settings_open {
                    vec!["Esc close settings"]
                } else if self.dashboard.user_menu.is_some() {
                    vec!["j/k select", "Enter choose", "Esc close"]
                } else if self.dashboard.focus == DashFocus::Search {
                    vec!["Type to search", "Enter browse results", "Esc clear"]
                } else if self.dashboard.focus == DashFocus::Sidebar {
                    vec!["j/k move", "Enter open", "Tab content", "u account", "q quit"]
                } else if self.dashboard.search.active() {
                    vec!["h/j/k/l move", "Enter open channel", "Esc clear search", "q quit"]
                } else {
                    vec![
                        "j/k section",
                        "h/l card",
                        "[/] scroll",
                        "Enter open channel",
                        "/ search",
                        "Tab sidebar",
                        "u account",
                        "r refresh",
                        "q quit",
                    ]
                }
            }
            Screen::Media => vec![
                "h/j/k/l move",
                "t/T time frame",
                "n/N limit",
                "v grid/list",
                "r refresh",
                "Enter open in browser",
                "Esc back",
            ],
        };
        parts.join(" · ")
    }
}

fn greeting_name(user: &User) -> String {
    user.first_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(&user.user_name)
        .to_string()
}

#[allow(clippy::too_many_arguments)]
fn draw_carousel_row(
    frame: &mut Frame<'_>,
    area: Rect,
    title: &str,
    cards: &[CardSpec],
    row: &mut CarouselRow,
    focused: bool,
    empty_text: &str,
    palette: &Palette,
    spinner: &str,
) {
    if area.height == 0 {
        return;
    }
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(area);
    let body = parts[1];
    row.carousel
        .set_dimensions(cards::row_width(cards.len()), u32::from(body.width));

    let title_style = if focused {
        Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(palette.text_primary)
            .add_modifier(Modifier::BOLD)
    };
    let arrow = |shown: bool, glyph: &'static str| {
        if shown {
            Span::styled(glyph, Style::default().fg(palette.accent))
        } else {
            Span::raw("  ")
        }
    };
    let header = Line::from(vec![
        Span::styled(title.to_string(), title_style),
        Span::raw("  "),
        arrow(row.carousel.show_left(), "◀ "),
        arrow(row.carousel.show_right(), "▶ "),
    ]);
    frame.render_widget(Paragraph::new(header), parts[0]);

    match row.carousel.content() {
        Content::Loading => {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!("{spinner} Loading..."),
                    Style::default().fg(palette.text_secondary),
                ))
                .alignment(Alignment::Center),
                body,
            );
        }
        Content::Error(message) => {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    message.to_string(),
                    Style::default().fg(palette.error),
                ))
                .alignment(Alignment::Center)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(palette.error)),
                ),
                body,
            );
        }
        Content::Items if cards.is_empty() => {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    empty_text.to_string(),
                    Style::default().fg(palette.text_secondary),
                ))
                .alignment(Alignment::Center),
                body,
            );
        }
        Content::Items => {
            let selected = focused.then_some(row.selected.min(cards.len() - 1));
            let lines = cards::card_row_lines(cards, selected, palette);
            let offset = u16::try_from(row.carousel.scroll_left()).unwrap_or(u16::MAX);
            frame.render_widget(Paragraph::new(lines).scroll((0, offset)), body);
        }
    }
}

fn draw_card_grid(
    frame: &mut Frame<'_>,
    area: Rect,
    all: &[CardSpec],
    selected: usize,
    columns: usize,
    row_offset: Option<&Cell<usize>>,
    palette: &Palette,
) {
    let row_height = CARD_HEIGHT + 1;
    let visible_rows = usize::from((area.height / row_height).max(1));
    let selected_row = selected / columns;
    let mut offset = row_offset.map(Cell::get).unwrap_or(0);
    if selected_row < offset {
        offset = selected_row;
    } else if selected_row >= offset + visible_rows {
        offset = selected_row + 1 - visible_rows;
    }
    if let Some(cell) = row_offset {
        cell.set(offset);
    }

    let mut y = area.y;
    for (row_index, chunk) in all.chunks(columns).enumerate().skip(offset) {
        if y + CARD_HEIGHT > area.y + area.height {
            break;
        }
        let in_row = (selected_row == row_index).then_some(selected % columns);
        let lines = cards::card_row_lines(chunk, in_row, palette);
        frame.render_widget(
            Paragraph::new(lines),
            Rect::new(area.x, y, area.width, CARD_HEIGHT),
        );
        y += row_height;
    }
}

fn media_list_item(post: &MediaPost, media: &MediaBrowser, palette: &Palette) -> ListItem<'static> {
    let kind = MediaKind::of(post);
    let kind_style = match kind {
        MediaKind::Image => Style::default().fg(palette.success),
        MediaKind::Video => Style::default().fg(palette.warning),
        MediaKind::Link => Style::default().fg(palette.accent),
    };
    let title = Line::from(vec![
        Span::styled(format!("[{}] ", kind.label()), kind_style),
        Span::styled(
            post.title.clone(),
            Style::default()
                .fg(palette.text_primary)
                .add_modifier(Modifier::BOLD),
        ),
    ]);
    let meta = Line::from(Span::styled(
        format!(
            "    u/{} · ▲ {} · {} · {}",
            post.author,
            post.score,
            browser::format_date(post.created_utc.as_deref()),
            cards::url_label(media.display_url(post)),
        ),
        Style::default().fg(palette.text_secondary),
    ));
    ListItem::new(vec![title, meta])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MockAuthService, MockChannelService, MockMediaService};
    use crate::forms::RegisterField;
    use crate::storage::Store;

    fn options(session: Arc<session::Manager>) -> Options {
        Options {
            session,
            channels: Arc::new(MockChannelService),
            media: Arc::new(MockMediaService),
            feed: config::FeedConfig {
                batch_delay: Duration::ZERO,
                ..config::FeedConfig::default()
            },
            browser: config::BrowserConfig::default(),
            ui: config::UIConfig::default(),
            status_message: String::new(),
            settings: Vec::new(),
        }
    }

    fn session(signed_in: bool) -> Arc<session::Manager> {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let manager = Arc::new(session::Manager::new(store, Arc::new(MockAuthService)));
        if signed_in {
            manager.login("grace", "pw").unwrap();
        }
        manager
    }

    fn drain_until<F: Fn(&Model) -> bool>(model: &mut Model, done: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(model) {
            assert!(Instant::now() < deadline, "timed out waiting for async work");
            if let Ok(message) = model.response_rx.recv_timeout(Duration::from_millis(50)) {
                model.handle_async_response(message);
            }
        }
    }

    #[test]
    fn signed_out_start_shows_auth_required_notice() {
        let model = Model::new(options(session(false)));
        assert_eq!(model.screen, Screen::Login);
        let notice = model.notice.as_ref().unwrap();
        assert_eq!(notice.title, AUTH_REQUIRED_TITLE);
        assert!(notice.expires_at.is_some());
    }

    #[test]
    fn notice_expires_after_ttl() {
        let mut model = Model::new(options(session(false)));
        assert!(!model.expire_transients(Instant::now()));
        assert!(model.expire_transients(Instant::now() + NOTICE_TTL));
        assert!(model.notice.is_none());
    }

    #[test]
    fn signed_in_start_loads_trending_and_first_batch() {
        let mut model = Model::new(options(session(true)));
        assert_eq!(model.screen, Screen::Dashboard);
        drain_until(&mut model, |m| {
            m.dashboard.pending_trending.is_none()
                && m.dashboard.pending_keywords.is_none()
                && !m.dashboard.loader.is_busy()
        });
        assert_eq!(model.dashboard.trending.len(), 4);
        assert_eq!(model.dashboard.loader.loaded_count(), 2);
        let sections = model.dashboard.sections();
        assert_eq!(sections[0], Section::Trending);
        assert_eq!(sections[1], Section::Keyword("cinema".into()));
        assert_eq!(sections.last(), Some(&Section::Sentinel));

        model.dashboard.sentinel_visible.set(true);
        model.after_draw();
        assert!(model.dashboard.loader.is_busy());
    }

    #[test]
    fn sidebar_logout_returns_to_login_and_clears_session() {
        let mut model = Model::new(options(session(true)));
        model.activate_sidebar(SidebarItem::Logout);
        assert_eq!(model.screen, Screen::Login);
        assert!(!model.session.is_authenticated());
        assert!(model.media_view.is_none());
    }

    #[test]
    fn invalid_registration_never_leaves_the_form() {
        let mut model = Model::new(options(session(false)));
        model.screen = Screen::Register;
        model.register_form.set(RegisterField::Username, "neo");
        model.register_form.set(RegisterField::Email, "neo@example.com");
        model.register_form.set(RegisterField::Password, "abc");
        model.register_form.set(RegisterField::ConfirmPassword, "abc");
        model.submit_register();
        assert!(!model.auth_pending);
        assert!(model.response_rx.try_recv().is_err());
    }

    #[test]
    fn empty_search_clears_results_without_request() {
        let mut model = Model::new(options(session(true)));
        model.dashboard.search.results = vec![Channel::default()];
        model.dashboard.search.query = "   ".into();
        model.update_search();
        assert!(model.dashboard.search.results.is_empty());
        assert!(model.dashboard.search.pending.is_none());
    }

    #[test]
    fn opening_a_channel_fetches_media() {
        let mut model = Model::new(options(session(true)));
        model.open_channel("pics".into());
        assert_eq!(model.screen, Screen::Media);
        drain_until(&mut model, |m| {
            m.media_view
                .as_ref()
                .map(|view| !view.browser.is_loading())
                .unwrap_or(false)
        });
        let view = model.media_view.as_ref().unwrap();
        assert_eq!(view.browser.items().len(), 12);
        assert!(!model.toasts.is_empty());
        model.close_media();
        assert_eq!(model.screen, Screen::Dashboard);
    }

    struct MalformedBackend;

    fn malformed(endpoint: &str) -> anyhow::Error {
        anyhow::Error::new(api::ApiError::UnexpectedShape {
            endpoint: endpoint.to_string(),
        })
    }

    impl ChannelService for MalformedBackend {
        fn popular_channels(&self) -> Result<Vec<Channel>> {
            Err(malformed(api::POPULAR_CHANNELS_PATH))
        }

        fn keywords(&self) -> Result<Vec<String>> {
            Err(malformed(api::KEYWORDS_PATH))
        }

        fn channels_for_keyword(&self, _keyword: &str) -> Result<Vec<Channel>> {
            Err(malformed(api::SEARCH_CHANNELS_PATH))
        }
    }

    impl MediaService for MalformedBackend {
        fn subreddit_media(
            &self,
            _subreddit: &str,
            _limit: browser::Limit,
            _time_frame: browser::TimeFrame,
        ) -> Result<Vec<MediaPost>> {
            Err(malformed(api::SUBREDDIT_MEDIA_PATH))
        }

        fn search_media(&self, _query: &str) -> Result<Vec<MediaItem>> {
            Err(malformed(api::SEARCH_MEDIA_PATH))
        }

        fn probe_image(&self, _url: &str) -> Result<()> {
            Ok(())
        }
    }

    fn malformed_model() -> Model {
        let mut opts = options(session(true));
        opts.channels = Arc::new(MalformedBackend);
        opts.media = Arc::new(MalformedBackend);
        Model::new(opts)
    }

    #[test]
    fn non_list_dashboard_responses_leave_empty_sections_with_errors() {
        let mut model = malformed_model();
        drain_until(&mut model, |m| {
            m.dashboard.pending_trending.is_none() && m.dashboard.pending_keywords.is_none()
        });

        assert!(model.dashboard.trending.is_empty());
        assert_eq!(
            model.dashboard.trending_row.carousel.content(),
            Content::Error(loader::INVALID_RESPONSE_MESSAGE)
        );
        assert_eq!(
            model.dashboard.loader.keywords_error(),
            Some(loader::INVALID_RESPONSE_MESSAGE)
        );
        assert!(model.dashboard.loader.keywords().is_empty());
        assert!(model
            .dashboard
            .sections()
            .contains(&Section::KeywordsError(loader::INVALID_RESPONSE_MESSAGE.into())));
    }

    #[test]
    fn non_list_search_response_clears_results_and_toasts() {
        let mut model = malformed_model();
        model.toasts.clear();
        model.dashboard.search.results = vec![Channel::default()];
        model.dashboard.search.query = "cats".into();
        model.update_search();
        drain_until(&mut model, |m| m.dashboard.search.pending.is_none());

        assert!(model.dashboard.search.results.is_empty());
        let toast = model.toasts.iter().next().unwrap();
        assert_eq!(toast.kind, ToastKind::Error);
        assert_eq!(toast.title, loader::INVALID_RESPONSE_MESSAGE);
    }

    #[test]
    fn greeting_prefers_first_name() {
        let mut user = User {
            user_name: "grace".into(),
            ..User::default()
        };
        assert_eq!(greeting_name(&user), "grace");
        user.first_name = Some("Grace".into());
        assert_eq!(greeting_name(&user), "Grace");
    }
}
