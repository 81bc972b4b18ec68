use std::error::Error;
use std::io;
use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::Local;
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::warn;
use unicode_width::UnicodeWidthChar;

use crate::calendar::{
	TimelineColumn, TimelineConfig, calendar_position, format_fuzzy_date, format_view_position, view_position,
};
use crate::domain::{Roadmap, StaffFilter, StaffRegistry};
use crate::layout::{ItemKind, LayoutMetrics, PlacedItem, TimelineLayout, layout_roadmap};
use crate::storage::save_roadmap;

const PROJECT_GUTTER: usize = 20;
const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const GRID_COLOR: Color = Color::DarkGray;
const TODAY_COLOR: Color = Color::LightRed;
const UNASSIGNED_BAR_COLOR: Color = Color::Rgb(100, 116, 139);

pub fn run_dashboard(
	roadmap: &mut Roadmap,
	roadmap_path: &Path,
	metrics: &LayoutMetrics,
) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, roadmap, roadmap_path, metrics);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	roadmap: &mut Roadmap,
	roadmap_path: &Path,
	metrics: &LayoutMetrics,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::default();

	loop {
		let filter = app.filter(&roadmap.staff);
		let layout = layout_roadmap(roadmap, &filter, metrics);
		app.clamp_scroll(&layout);
		let today = today_view_position(roadmap);
		terminal.draw(|frame| draw_dashboard(frame, &app, roadmap, &layout, today))?;

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				if handle_key(&mut app, key.code, roadmap, roadmap_path) {
					break;
				}
			}
		}
	}

	Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, roadmap: &mut Roadmap, roadmap_path: &Path) -> bool {
	match code {
		KeyCode::Char('q') | KeyCode::Esc => return true,
		KeyCode::Down | KeyCode::Char('j') => {
			app.scroll = app.scroll.saturating_add(1);
		}
		KeyCode::Up | KeyCode::Char('k') => {
			app.scroll = app.scroll.saturating_sub(1);
		}
		KeyCode::Char('f') => {
			app.filter_index = (app.filter_index + 1) % (roadmap.staff.len() + 1);
			app.scroll = 0;
			app.status = format!("Filter: {}", app.filter_label(&roadmap.staff));
		}
		KeyCode::Char('F') => {
			app.filter_index = 0;
			app.scroll = 0;
			app.status = "Filter: All Projects".to_string();
		}
		KeyCode::Left | KeyCode::Char('h') => shift_window(app, roadmap, roadmap_path, -1),
		KeyCode::Right | KeyCode::Char('l') => shift_window(app, roadmap, roadmap_path, 1),
		KeyCode::Char('+') => resize_window(app, roadmap, roadmap_path, 1),
		KeyCode::Char('-') => resize_window(app, roadmap, roadmap_path, -1),
		_ => {}
	}

	false
}

fn shift_window(app: &mut App, roadmap: &mut Roadmap, roadmap_path: &Path, months: i32) {
	let shifted = roadmap.config.shifted(months);
	apply_config(app, roadmap, roadmap_path, shifted);
}

fn resize_window(app: &mut App, roadmap: &mut Roadmap, roadmap_path: &Path, months: i32) {
	let mut resized = roadmap.config;
	let end = resized.shifted(months);
	resized.end_year = end.end_year;
	resized.end_month = end.end_month;
	apply_config(app, roadmap, roadmap_path, resized);
}

fn apply_config(
	app: &mut App,
	roadmap: &mut Roadmap,
	roadmap_path: &Path,
	config: TimelineConfig,
) {
	if let Err(err) = roadmap.reconfigure(config) {
		app.status = format!("Error: {err}");
		return;
	}

	app.status = match save_roadmap(roadmap_path, roadmap) {
		Ok(()) => format!(
			"Timeline {} - {}",
			format_fuzzy_date(f64::from(config.start_month), config.start_year),
			format_fuzzy_date(f64::from(config.end_month), config.end_year)
		),
		Err(err) => {
			warn!(error = %err, "failed to save roadmap");
			format!("Error: {err}")
		}
	};
}

fn today_view_position(roadmap: &Roadmap) -> f64 {
	let (month, year) = calendar_position(Local::now().date_naive());
	view_position(month, year, &roadmap.config)
}

fn draw_dashboard(frame: &mut Frame, app: &App, roadmap: &Roadmap, layout: &TimelineLayout, today: f64) {
	let sections = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(3), Constraint::Min(6), Constraint::Length(4)])
		.split(frame.area());

	render_header(frame, sections[0], app, roadmap, layout, today);
	render_rows(frame, sections[1], app, layout, today);
	render_footer(frame, sections[2], app);
}

fn render_header(
	frame: &mut Frame,
	area: Rect,
	app: &App,
	roadmap: &Roadmap,
	layout: &TimelineLayout,
	today: f64,
) {
	let track_width = track_width(area);
	let mut cells = vec![Cell::blank(); track_width];
	let mut next_free = 0;
	for (index, column) in layout.columns.iter().enumerate() {
		let x = column_x(index, layout.columns.len(), track_width);
		if x < next_free {
			continue;
		}
		next_free = write_text(&mut cells, x, &column.label, Style::default().add_modifier(Modifier::BOLD)) + 1;
	}
	mark_today(&mut cells, today, layout.columns.len());

	let mut spans = vec![Span::styled(
		pad(&format!("Today {}", format_view_position(today, &layout.columns)), PROJECT_GUTTER),
		Style::default().fg(TODAY_COLOR),
	)];
	spans.extend(cells_to_spans(&cells));

	let title = format!(
		"Roadmap | {} projects | filter: {}",
		roadmap.projects.len(),
		app.filter_label(&roadmap.staff)
	);
	let header = Paragraph::new(vec![Line::from(spans)]).block(
		Block::default()
			.borders(Borders::ALL)
			.title(title)
			.border_style(Style::default().fg(FOCUSED_PANEL_BORDER_COLOR)),
	);
	frame.render_widget(header, area);
}

fn render_rows(frame: &mut Frame, area: Rect, app: &App, layout: &TimelineLayout, today: f64) {
	let track_width = track_width(area);
	let total_columns = layout.columns.len();
	let mut lines = Vec::new();

	for row in layout.rows.iter().skip(app.scroll) {
		let lane_count = row.layout.items.len().max(1);
		for lane in 0..lane_count {
			let gutter = if lane == 0 {
				pad(&format!("{}. {}", row.project_index, row.name), PROJECT_GUTTER)
			} else {
				pad("", PROJECT_GUTTER)
			};

			let mut cells = grid_cells(total_columns, track_width);
			mark_today(&mut cells, today, total_columns);
			if let Some(item) = row.layout.items.get(lane) {
				paint_item(&mut cells, item);
			}

			let mut spans = vec![Span::styled(gutter, Style::default().add_modifier(Modifier::BOLD))];
			spans.extend(cells_to_spans(&cells));
			lines.push(Line::from(spans));
		}
		lines.push(Line::from(Span::styled(
			"─".repeat(PROJECT_GUTTER + track_width),
			Style::default().fg(GRID_COLOR),
		)));
	}

	if lines.is_empty() {
		lines.push(Line::from(if total_columns == 0 {
			"(timeline has no months)"
		} else {
			"(no projects to show)"
		}));
	}

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Timeline"));
	frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let footer_lines = vec![
		Line::from("j/k scroll projects | f cycle staff filter | F clear filter | h/l shift window | +/- resize window | q quit"),
		Line::from(app.status.clone()),
	];

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn paint_item(cells: &mut [Cell], item: &PlacedItem) {
	let width = cells.len();
	if width == 0 {
		return;
	}

	match item.kind {
		ItemKind::Milestone => {
			let x = percent_to_x(item.geometry.left_percent, width).clamp(0, width as i64 - 1) as usize;
			let style = Style::default().fg(Color::LightYellow).add_modifier(Modifier::BOLD);
			cells[x] = Cell::new('◆', style);
			let label = match &item.icon {
				Some(icon) => format!("{icon} {}", item.name),
				None => item.name.clone(),
			};
			place_outside(cells, x, x + 1, &label, style);
		}
		ItemKind::Task => {
			let left = item.geometry.left_percent;
			let right = left + item.geometry.width_percent.unwrap_or(0.0);
			let start = percent_to_x(left, width).clamp(0, width as i64 - 1) as usize;
			let end = (percent_to_x(right, width).clamp(0, width as i64) as usize).max(start + 1);

			let (bar_color, lead_initials, summary) = match &item.team {
				Some(team) if !team.lead.is_unassigned() => (
					color_from_hex(&team.lead.color).unwrap_or(UNASSIGNED_BAR_COLOR),
					team.lead.initials.clone(),
					team.summary.clone(),
				),
				Some(team) => (UNASSIGNED_BAR_COLOR, team.lead.initials.clone(), team.summary.clone()),
				None => (UNASSIGNED_BAR_COLOR, String::new(), String::new()),
			};
			let bar_style = Style::default().bg(bar_color).fg(Color::Black);
			for cell in &mut cells[start..end] {
				*cell = Cell::new(' ', bar_style);
			}

			let badges = if item.geometry.badges_outside {
				String::new()
			} else {
				format!("[{lead_initials}] ")
			};
			if item.geometry.label_outside {
				if !badges.is_empty() {
					write_text(&mut cells[..end], start, &badges, bar_style);
				}
				let label = format!("{} ({summary})", item.name);
				place_outside(cells, start, end, &label, Style::default().add_modifier(Modifier::BOLD));
			} else {
				write_text(&mut cells[..end], start, &format!("{badges}{}", item.name), bar_style.add_modifier(Modifier::BOLD));
			}
		}
	}
}

/// Writes `label` to the right of `[start, end)`, or to the left when the
/// right side has no room.
fn place_outside(cells: &mut [Cell], start: usize, end: usize, label: &str, style: Style) {
	let label_width = text_width(label);
	if end + 1 + label_width <= cells.len() || start < label_width + 1 {
		write_text(cells, end + 1, label, style);
	} else {
		write_text(cells, start - label_width - 1, label, style);
	}
}

fn grid_cells(total_columns: usize, track_width: usize) -> Vec<Cell> {
	let mut cells = vec![Cell::blank(); track_width];
	for index in 1..total_columns {
		let x = column_x(index, total_columns, track_width);
		if let Some(cell) = cells.get_mut(x) {
			*cell = Cell::new('┊', Style::default().fg(GRID_COLOR));
		}
	}
	cells
}

fn mark_today(cells: &mut [Cell], today: f64, total_columns: usize) {
	if total_columns == 0 || today < 1.0 || today >= total_columns as f64 + 1.0 {
		return;
	}
	let percent = (today - 1.0) / total_columns as f64 * 100.0;
	let x = percent_to_x(percent, cells.len());
	if let Some(cell) = usize::try_from(x).ok().and_then(|x| cells.get_mut(x)) {
		if cell.symbol == ' ' || cell.symbol == '┊' {
			*cell = Cell::new('│', Style::default().fg(TODAY_COLOR));
		}
	}
}

/// Writes text starting at `x`, returning the column after the last glyph.
fn write_text(cells: &mut [Cell], x: usize, text: &str, style: Style) -> usize {
	let mut cursor = x;
	for symbol in text.chars() {
		if UnicodeWidthChar::width(symbol).unwrap_or(0) != 1 {
			continue;
		}
		let Some(cell) = cells.get_mut(cursor) else {
			break;
		};
		*cell = Cell::new(symbol, style);
		cursor += 1;
	}
	cursor
}

fn cells_to_spans(cells: &[Cell]) -> Vec<Span<'static>> {
	let mut spans = Vec::new();
	let mut buffer = String::new();
	let mut current_style = None;

	for cell in cells {
		if current_style != Some(cell.style) {
			if let Some(style) = current_style {
				spans.push(Span::styled(std::mem::take(&mut buffer), style));
			}
			current_style = Some(cell.style);
		}
		buffer.push(cell.symbol);
	}
	if let Some(style) = current_style {
		spans.push(Span::styled(buffer, style));
	}

	spans
}

fn track_width(area: Rect) -> usize {
	usize::from(area.width.saturating_sub(2)).saturating_sub(PROJECT_GUTTER)
}

fn column_x(index: usize, total_columns: usize, track_width: usize) -> usize {
	if total_columns == 0 {
		return 0;
	}
	index * track_width / total_columns
}

fn percent_to_x(percent: f64, width: usize) -> i64 {
	if !percent.is_finite() {
		return 0;
	}
	(percent / 100.0 * width as f64).round() as i64
}

fn text_width(text: &str) -> usize {
	text.chars()
		.filter(|symbol| UnicodeWidthChar::width(*symbol) == Some(1))
		.count()
}

fn pad(text: &str, width: usize) -> String {
	let mut out = text.chars().take(width.saturating_sub(1)).collect::<String>();
	while out.chars().count() < width {
		out.push(' ');
	}
	out
}

fn color_from_hex(hex: &str) -> Option<Color> {
	let digits = hex.strip_prefix('#')?;
	if digits.len() != 6 {
		return None;
	}
	let channel = |range: std::ops::Range<usize>| u8::from_str_radix(digits.get(range)?, 16).ok();
	Some(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
	symbol: char,
	style: Style,
}

impl Cell {
	fn new(symbol: char, style: Style) -> Self {
		Self { symbol, style }
	}

	fn blank() -> Self {
		Self::new(' ', Style::default())
	}
}

#[derive(Debug, Clone)]
struct App {
	scroll: usize,
	filter_index: usize,
	status: String,
}

impl Default for App {
	fn default() -> Self {
		Self {
			scroll: 0,
			filter_index: 0,
			status: "Ready".to_string(),
		}
	}
}

impl App {
	fn filter(&self, staff: &StaffRegistry) -> StaffFilter {
		self.filter_index
			.checked_sub(1)
			.and_then(|index| staff.sorted_by_surname().get(index).map(|(id, _)| id.to_string()))
			.map(StaffFilter::Staff)
			.unwrap_or(StaffFilter::All)
	}

	fn filter_label(&self, staff: &StaffRegistry) -> String {
		match self.filter(staff) {
			StaffFilter::All => "All Projects".to_string(),
			StaffFilter::Staff(id) => staff
				.get(&id)
				.map(|member| member.name.clone())
				.unwrap_or(id),
		}
	}

	fn clamp_scroll(&mut self, layout: &TimelineLayout) {
		self.scroll = self.scroll.min(layout.rows.len().saturating_sub(1));
	}
}

pub fn print_columns(columns: &[TimelineColumn]) {
	if columns.is_empty() {
		println!("timeline has no months");
		return;
	}

	for (index, column) in columns.iter().enumerate() {
		println!("{:>3} | {} | {:02}/{}", index + 1, column.label, column.month, column.year);
	}
}

pub fn print_layout(layout: &TimelineLayout) {
	println!(
		"{} columns | grid {:.0}px | {} projects",
		layout.columns.len(),
		layout.grid_width_px,
		layout.rows.len()
	);

	for row in &layout.rows {
		println!("\n{}. {} (row height {}px)", row.project_index, row.name, row.layout.row_height_px);
		if row.layout.items.is_empty() {
			println!("   (nothing on the timeline)");
			continue;
		}

		for item in &row.layout.items {
			let kind = match item.kind {
				ItemKind::Milestone => "milestone",
				ItemKind::Task => "task",
			};
			let span = match item.view_end {
				Some(end) => format!(
					"{} -> {}",
					format_view_position(item.view_start, &layout.columns),
					format_view_position(end, &layout.columns)
				),
				None => format_view_position(item.view_start, &layout.columns),
			};
			let width = item
				.geometry
				.width_percent
				.map(|width| format!(" width {width:.2}%"))
				.unwrap_or_default();
			let team = item
				.team
				.as_ref()
				.map(|team| format!(" | {}", team.summary))
				.unwrap_or_default();
			println!(
				"   lane {:>2} | {:<9} | {} | {} | left {:.2}%{} top {}px | label {} badges {}{}",
				item.lane,
				kind,
				item.name,
				span,
				item.geometry.left_percent,
				width,
				item.geometry.top_px,
				placement(item.geometry.label_outside),
				placement(item.geometry.badges_outside),
				team
			);
		}
	}
}

pub fn print_staff(staff: &StaffRegistry) {
	if staff.is_empty() {
		println!("no staff yet");
		return;
	}

	for (id, member) in staff.sorted_by_surname() {
		println!(
			"{} | {} | {} | {} | {}{}",
			id,
			member.display_initials.as_deref().unwrap_or("?"),
			member.name,
			if member.role.is_empty() { "-" } else { member.role.as_str() },
			member.color.as_deref().unwrap_or("-"),
			if member.is_org { " | organisation" } else { "" }
		);
	}
}

pub fn print_projects(roadmap: &Roadmap) {
	if roadmap.projects.is_empty() {
		println!("no projects yet");
		return;
	}

	for (index, project) in roadmap.projects.iter().enumerate() {
		println!(
			"{} | {} | {} tasks | {} milestones",
			index,
			project.name,
			project.tasks.len(),
			project.milestones.len()
		);
		for goal in &project.goals {
			println!("    goal: {goal}");
		}
	}
}

fn placement(outside: bool) -> &'static str {
	if outside { "outside" } else { "inside" }
}
