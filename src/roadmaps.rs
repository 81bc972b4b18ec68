use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::debug;

const APP_DIR: &str = "gantt_flow";
const ROADMAP_ENV: &str = "GANTT_FLOW_ROADMAP";
const STATE_DIR_ENV: &str = "GANTT_FLOW_STATE_DIR";
const RECENT_ROADMAPS_FILE: &str = "recent_roadmaps.txt";
const MAX_RECENT_ROADMAPS: usize = 50;

pub fn resolve_roadmap_path(cli_path: Option<PathBuf>) -> Result<PathBuf, Error> {
	let explicit = cli_path.or_else(|| non_empty_var(ROADMAP_ENV).map(PathBuf::from));
	if let Some(path) = explicit {
		return Ok(absolutize(path));
	}

	let recent = recent_roadmaps(1).unwrap_or_default();
	recent.into_iter().next().ok_or_else(|| {
		Error::new(
			ErrorKind::NotFound,
			format!("no roadmap selected: pass --roadmap <path>, set {ROADMAP_ENV}, or pick one from `roadmaps`"),
		)
	})
}

pub fn remember_roadmap(path: &Path) -> Result<(), Error> {
	let path = absolutize(path.to_path_buf());
	let entries = recent_roadmaps(MAX_RECENT_ROADMAPS)?;
	save_recent_roadmaps(&promote(entries, path))
}

pub fn recent_roadmaps(limit: usize) -> Result<Vec<PathBuf>, Error> {
	match fs::read_to_string(recent_roadmaps_path()) {
		Ok(raw) => Ok(parse_recent(&raw, limit)),
		Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
		Err(err) => Err(err),
	}
}

/// Directory holding the recent-roadmaps list and the default settings
/// file. `GANTT_FLOW_STATE_DIR` wins over the platform location.
pub fn state_dir() -> PathBuf {
	if let Some(path) = non_empty_var(STATE_DIR_ENV) {
		return PathBuf::from(path);
	}

	platform_state_base()
		.map(|base| base.join(APP_DIR))
		.unwrap_or_else(|| PathBuf::from(format!(".{APP_DIR}")))
}

fn platform_state_base() -> Option<PathBuf> {
	let local_app_data = if cfg!(target_os = "windows") {
		non_empty_var("LOCALAPPDATA")
	} else {
		None
	};

	local_app_data
		.or_else(|| non_empty_var("XDG_STATE_HOME"))
		.map(PathBuf::from)
		.or_else(|| non_empty_var("HOME").map(|home| Path::new(&home).join(".local").join("state")))
}

fn non_empty_var(name: &str) -> Option<OsString> {
	env::var_os(name).filter(|value| !value.is_empty())
}

fn parse_recent(raw: &str, limit: usize) -> Vec<PathBuf> {
	raw.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty())
		.take(limit)
		.map(PathBuf::from)
		.collect()
}

fn render_recent(entries: &[PathBuf]) -> String {
	entries
		.iter()
		.map(|path| format!("{}\n", path.display()))
		.collect()
}

fn promote(mut entries: Vec<PathBuf>, path: PathBuf) -> Vec<PathBuf> {
	entries.retain(|entry| entry != &path);
	entries.insert(0, path);
	entries.truncate(MAX_RECENT_ROADMAPS);
	entries
}

// Written to a sibling file first so a crash never leaves a half-written list.
fn save_recent_roadmaps(entries: &[PathBuf]) -> Result<(), Error> {
	let path = recent_roadmaps_path();
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}

	let staged = path.with_extension("txt.tmp");
	fs::write(&staged, render_recent(entries))?;
	fs::rename(&staged, &path)?;
	debug!(path = %path.display(), entries = entries.len(), "saved recent roadmaps");
	Ok(())
}

fn recent_roadmaps_path() -> PathBuf {
	state_dir().join(RECENT_ROADMAPS_FILE)
}

/// Resolves symlinks for files that exist; new roadmap files are only made
/// absolute against the working directory.
fn absolutize(path: PathBuf) -> PathBuf {
	fs::canonicalize(&path)
		.or_else(|_| std::path::absolute(&path))
		.unwrap_or(path)
}
