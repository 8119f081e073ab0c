use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Gauge, Paragraph};
use tracing::{info, warn};

use mapstat_terminal::config::AppConfig;
use mapstat_terminal::coordinator::{AnalysisCoordinator, AnalysisState};
use mapstat_terminal::logging;
use mapstat_terminal::match_source::{self, PlayerData};
use mapstat_terminal::model::{KNOWN_MAPS, MapSideStats, map_display_name};
use mapstat_terminal::state::{AppState, Screen, StatsView};

struct App {
    config: AppConfig,
    state: AppState,
    coordinator: AnalysisCoordinator,
    should_quit: bool,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let mut app = Self {
            config,
            state: AppState::new(),
            coordinator: AnalysisCoordinator::new(),
            should_quit: false,
        };
        app.reload_matches();
        app
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('1') => {
                self.state.set_screen(Screen::General);
            }
            KeyCode::Char('2') | KeyCode::Tab => {
                self.state.set_screen(Screen::Maps);
            }
            KeyCode::Char('a') | KeyCode::Char('A') => self.start_analysis(),
            KeyCode::Char('r') | KeyCode::Char('R') => self.reload_matches(),
            KeyCode::Char('j') | KeyCode::Down if self.state.screen == Screen::Maps => {
                self.state.select_map_next()
            }
            KeyCode::Char('k') | KeyCode::Up if self.state.screen == Screen::Maps => {
                self.state.select_map_prev()
            }
            KeyCode::Char('s') if self.state.screen == Screen::Maps => self.state.toggle_side(),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
    }

    fn reload_matches(&mut self) {
        if self.coordinator.is_running() {
            self.state
                .push_log("[INFO] Analysis in progress, reload after it finishes");
            return;
        }
        let mut data = PlayerData::new();
        match &self.config.match_history_file {
            Some(path) => match match_source::load_match_history(path) {
                Ok(history) => data.set_matches(history.player, history.matches),
                Err(err) => {
                    warn!("match history load failed: {err:#}");
                    self.state.push_log(format!("[WARN] {err:#}"));
                    return;
                }
            },
            None => {
                let player = self.config.player.clone();
                let matches = match_source::generate_demo_matches(
                    &player,
                    self.config.demo_matches,
                    self.config.demo_seed,
                );
                data.set_matches(player, matches);
            }
        }
        self.state.push_log(format!(
            "[INFO] Loaded {} matches",
            data.available_matches.len()
        ));
        self.state.player_data = data;
    }

    fn start_analysis(&mut self) {
        let Some(player) = self.state.analysis_player() else {
            self.state.push_log("[INFO] No player loaded");
            return;
        };
        if !self.state.player_data.has_match_details() {
            self.state
                .push_log("[INFO] No match details to analyze, press r to reload");
            return;
        }
        let batch = self.state.player_data.batch();
        let matches = batch.len();
        match self.coordinator.start_analysis(batch, player) {
            Ok(job_id) => {
                info!(job_id, matches, "analysis requested");
                self.state
                    .push_log(format!("[INFO] Analyzing {matches} matches (job {job_id})"));
            }
            Err(err) => self.state.push_log(format!("[WARN] {err}")),
        }
    }

    fn pump_analysis(&mut self) {
        let was_running = self.coordinator.is_running();
        self.coordinator.poll(&mut self.state);
        if was_running
            && !self.coordinator.is_running()
            && let Some(err) = self.coordinator.last_error()
        {
            self.state.push_log(format!("[WARN] Analysis failed: {err}"));
        }
        if self.state.stats_dirty {
            self.state.draw_stats(&self.coordinator);
        }
    }
}

fn main() -> Result<()> {
    let config = AppConfig::load();
    let _log_guard = logging::init(&config)?;
    info!(player = %config.player, "starting mapstat terminal");

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(config);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = app.config.tick_rate;
    let mut last_tick = Instant::now();

    loop {
        app.pump_analysis();

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(app))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::General => render_general(frame, chunks[1], app),
        Screen::Maps => render_maps(frame, chunks[1], &app.state),
    }

    let footer = Paragraph::new(footer_text(&app.state))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(app: &App) -> String {
    let player = app
        .state
        .player_data
        .identity
        .as_ref()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    let tab = match app.state.screen {
        Screen::General => "GENERAL",
        Screen::Maps => "MAPS",
    };
    let title = format!(
        "MAPSTAT | {tab} | Player: {player} | {}",
        analysis_state_label(app.coordinator.state())
    );
    let line1 = format!("  /\\   {title}");
    let line2 = " /  \\".to_string();
    let line3 = "/____\\".to_string();
    format!("{line1}\n{line2}\n{line3}")
}

fn footer_text(state: &AppState) -> String {
    let maps = if state.map_tab_enabled {
        "2 Maps"
    } else {
        "2 Maps (locked)"
    };
    match state.screen {
        Screen::General => format!("1 General | {maps} | a Analyze | r Reload | ? Help | q Quit"),
        Screen::Maps => {
            "1 General | j/k/↑/↓ Map | s Side | a Analyze | ? Help | q Quit".to_string()
        }
    }
}

fn render_general(frame: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let matches = Paragraph::new(match_list_text(&app.state))
        .block(Block::default().title("Matches").borders(Borders::ALL));
    frame.render_widget(matches, columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(columns[1]);

    let (ratio, label) = match app.coordinator.progress() {
        Some((current, total)) if total > 0 => (
            current as f64 / total as f64,
            format!("{current}/{total} matches"),
        ),
        _ if app.coordinator.is_analyzed() => (1.0, "done".to_string()),
        _ => (0.0, analysis_state_label(app.coordinator.state()).to_string()),
    };
    let gauge = Gauge::default()
        .block(Block::default().title("Analysis").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(label);
    frame.render_widget(gauge, right[0]);

    let console = Paragraph::new(console_text(&app.state, right[1].height.saturating_sub(2)))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, right[1]);
}

fn render_maps(frame: &mut Frame, area: Rect, state: &AppState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(20), Constraint::Min(1)])
        .split(area);

    let list = KNOWN_MAPS
        .iter()
        .enumerate()
        .map(|(idx, (_, name))| {
            let marker = if idx == state.selected_map { ">" } else { " " };
            Line::from(format!("{marker} {name}")).style(if idx == state.selected_map {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            })
        })
        .collect::<Vec<_>>();
    let list = Paragraph::new(list).block(Block::default().title("Maps").borders(Borders::ALL));
    frame.render_widget(list, columns[0]);

    let detail = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(10), Constraint::Min(1)])
        .split(columns[1]);

    let Some(view) = &state.stats_view else {
        let empty = Paragraph::new("No stats drawn yet")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, columns[1]);
        return;
    };

    let title = format!("{} | {}", map_display_name(&view.map_id), view.side);
    let stats = Paragraph::new(stats_text(view))
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(stats, detail[0]);

    match view.stats.as_ref() {
        Some(stats) if !stats.kill_zones.is_empty() => {
            frame.render_widget(zone_bar_chart(stats), detail[1]);
        }
        _ => {
            let empty = Paragraph::new("No zone data")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().title("Kill zones").borders(Borders::ALL));
            frame.render_widget(empty, detail[1]);
        }
    }
}

fn match_list_text(state: &AppState) -> String {
    let summaries = &state.player_data.summaries;
    if summaries.is_empty() {
        return "No matches loaded".to_string();
    }
    summaries
        .iter()
        .map(|m| {
            let result = match m.won {
                Some(true) => "W",
                Some(false) => "L",
                None => "D",
            };
            format!(
                "{} {:<8} {:<10} {:>2}r {}",
                format_started(m.started_at),
                m.match_id,
                map_display_name(&m.map_id),
                m.rounds,
                result
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn stats_text(view: &StatsView) -> String {
    if !view.analyzed {
        return "Not analyzed yet".to_string();
    }
    let Some(stats) = &view.stats else {
        return "No matches on this map and side".to_string();
    };
    let mut lines = vec![
        format!("Matches       {}", stats.matches),
        format!(
            "Rounds        {}/{} won ({})",
            stats.rounds_won,
            stats.rounds_played,
            format_pct(stats.round_win_rate())
        ),
        format!(
            "K/D           {}/{} ({})",
            stats.kills,
            stats.deaths,
            stats
                .kd_ratio()
                .map(|kd| format!("{kd:.2}"))
                .unwrap_or_else(|| "-".to_string())
        ),
    ];
    if let Some(analytics) = &view.analytics {
        lines.push(String::new());
        lines.push(format!(
            "Map: {}/{} won ({}) | ATK {} | DEF {}",
            analytics.matches_won,
            analytics.matches_played,
            format_pct(analytics.match_win_rate()),
            format_pct(analytics.attack_round_win_rate),
            format_pct(analytics.defense_round_win_rate)
        ));
        lines.push(format!(
            "Best zone: {} | Worst zone: {}",
            analytics.most_lethal_zone.as_deref().unwrap_or("-"),
            analytics.deadliest_zone.as_deref().unwrap_or("-")
        ));
    }
    lines.join("\n")
}

fn zone_bar_chart(stats: &MapSideStats) -> BarChart<'static> {
    let bars = stats
        .kill_zones
        .iter()
        .map(|(zone, kills)| {
            let deaths = stats.death_zones.get(zone).copied().unwrap_or(0);
            Bar::default()
                .value(u64::from(*kills))
                .label(Line::from(zone.clone()))
                .text_value(format!("{kills}/{deaths}"))
                .style(Style::default().fg(Color::Green))
        })
        .collect::<Vec<_>>();

    BarChart::default()
        .block(Block::default().title("Kill zones (kills/deaths)").borders(Borders::ALL))
        .data(BarGroup::default().bars(&bars))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
}

fn console_text(state: &AppState, rows: u16) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    let rows = rows.max(1) as usize;
    let skip = state.logs.len().saturating_sub(rows);
    state
        .logs
        .iter()
        .skip(skip)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn analysis_state_label(state: AnalysisState) -> &'static str {
    match state {
        AnalysisState::NotAnalyzed => "not analyzed",
        AnalysisState::Analyzing => "analyzing",
        AnalysisState::Analyzed => "analyzed",
    }
}

fn format_pct(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.0}%", r * 100.0))
        .unwrap_or_else(|| "-".to_string())
}

fn format_started(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "--".to_string())
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Mapstat Terminal - Help",
        "",
        "Global:",
        "  1            General",
        "  2 / Tab      Maps (after analysis)",
        "  a            Analyze loaded matches",
        "  r            Reload matches",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Maps:",
        "  j/k or ↑/↓   Select map",
        "  s            Toggle attack/defense",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
