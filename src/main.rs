mod calendar;
mod domain;
mod layout;
mod roadmaps;
mod settings;
mod storage;
mod ui;

use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::calendar::{TimelineConfig, build_timeline_columns, format_fuzzy_date, parse_year_month};
use crate::domain::{Milestone, MilestoneUpdate, StaffFilter, StaffRef, SupportRef, Task, TaskUpdate};
use crate::layout::layout_roadmap;
use crate::roadmaps::{recent_roadmaps, remember_roadmap, resolve_roadmap_path};
use crate::settings::load_settings;
use crate::storage::{export_roadmap, import_roadmap, load_roadmap, save_roadmap};
use crate::ui::{print_columns, print_layout, print_projects, print_staff, run_dashboard};

#[derive(Debug, Parser)]
#[command(name = "gantt-flow", about = "Roadmap and Gantt timeline planner")]
struct Cli {
	#[arg(long, global = true)]
	roadmap: Option<PathBuf>,
	#[arg(long, global = true)]
	settings: Option<PathBuf>,
	#[arg(short, long, global = true, action = ArgAction::Count)]
	verbose: u8,
	#[arg(short, long, global = true, action = ArgAction::Count)]
	quiet: u8,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Init {
		#[arg(long)]
		start: Option<String>,
		#[arg(long)]
		end: Option<String>,
	},
	Dashboard,
	Configure {
		#[arg(long)]
		start: String,
		#[arg(long)]
		end: String,
	},
	Shift {
		#[arg(long, allow_hyphen_values = true)]
		months: i32,
	},
	AddStaff {
		#[arg(long)]
		name: String,
		#[arg(long, default_value = "Member")]
		role: String,
		#[arg(long)]
		org: bool,
	},
	RemoveStaff {
		#[arg(long)]
		id: String,
	},
	ListStaff,
	AddProject {
		#[arg(long)]
		name: String,
	},
	RenameProject {
		#[arg(long)]
		project: usize,
		#[arg(long)]
		name: String,
	},
	RemoveProject {
		#[arg(long)]
		project: usize,
	},
	AddGoal {
		#[arg(long)]
		project: usize,
		#[arg(long)]
		goal: String,
	},
	ListProjects,
	AddTask {
		#[arg(long)]
		project: usize,
		#[arg(long)]
		name: String,
		#[arg(long)]
		start: f64,
		#[arg(long)]
		start_year: i32,
		#[arg(long)]
		end: f64,
		#[arg(long)]
		end_year: i32,
		#[arg(long)]
		lead: Option<String>,
		#[arg(long)]
		support: Vec<String>,
	},
	EditTask {
		#[arg(long)]
		project: usize,
		#[arg(long)]
		task: usize,
		#[arg(long)]
		name: Option<String>,
		#[arg(long, allow_hyphen_values = true)]
		start: Option<f64>,
		#[arg(long)]
		start_year: Option<i32>,
		#[arg(long, allow_hyphen_values = true)]
		end: Option<f64>,
		#[arg(long)]
		end_year: Option<i32>,
		#[arg(long)]
		lead: Option<String>,
		#[arg(long)]
		support: Vec<String>,
		#[arg(long, conflicts_with = "support")]
		clear_support: bool,
	},
	RemoveTask {
		#[arg(long)]
		project: usize,
		#[arg(long)]
		task: usize,
	},
	AddMilestone {
		#[arg(long)]
		project: usize,
		#[arg(long)]
		name: String,
		#[arg(long)]
		month: f64,
		#[arg(long)]
		year: i32,
		#[arg(long)]
		icon: Option<String>,
	},
	EditMilestone {
		#[arg(long)]
		project: usize,
		#[arg(long)]
		milestone: usize,
		#[arg(long)]
		name: Option<String>,
		#[arg(long, allow_hyphen_values = true)]
		month: Option<f64>,
		#[arg(long)]
		year: Option<i32>,
		#[arg(long)]
		icon: Option<String>,
	},
	RemoveMilestone {
		#[arg(long)]
		project: usize,
		#[arg(long)]
		milestone: usize,
	},
	Columns,
	Preview {
		#[arg(long, allow_hyphen_values = true)]
		value: f64,
		#[arg(long)]
		year: i32,
	},
	Layout {
		#[arg(long)]
		staff: Option<String>,
		#[arg(long)]
		json: bool,
	},
	Export {
		#[arg(long)]
		out: PathBuf,
	},
	Import {
		#[arg(long)]
		from: PathBuf,
		#[arg(long)]
		adopt_config: bool,
	},
	Roadmaps {
		#[arg(long, default_value_t = 20)]
		limit: usize,
	},
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	init_tracing(cli.verbose, cli.quiet)?;

	match &cli.command {
		Some(Command::Roadmaps { limit }) => {
			print_recent_roadmaps(*limit)?;
			return Ok(());
		}
		Some(Command::Preview { value, year }) => {
			println!("{}", format_fuzzy_date(*value, *year));
			return Ok(());
		}
		_ => {}
	}

	let settings = load_settings(cli.settings.as_deref())?;
	let roadmap_path = resolve_roadmap_path(cli.roadmap)?;
	let mut roadmap = load_roadmap(&roadmap_path)?;
	if let Err(err) = remember_roadmap(&roadmap_path) {
		warn!(error = %err, "failed to store recent roadmap");
	}
	debug!(path = %roadmap_path.display(), "using roadmap");

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Init { start, end } => {
			if start.is_some() || end.is_some() {
				let config = config_from_args(&roadmap.config, start.as_deref(), end.as_deref())?;
				roadmap.reconfigure(config)?;
			}
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("initialized roadmap at {}", roadmap_path.display());
		}
		Command::Dashboard => {
			run_dashboard(&mut roadmap, &roadmap_path, &settings.layout)?;
		}
		Command::Configure { start, end } => {
			let config = config_from_args(&roadmap.config, Some(start.as_str()), Some(end.as_str()))?;
			roadmap.reconfigure(config)?;
			save_roadmap(&roadmap_path, &roadmap)?;
			info!(columns = config.column_count(), "timeline reconfigured");
			println!("timeline now spans {} months", config.column_count());
		}
		Command::Shift { months } => {
			let shifted = roadmap.config.shifted(months);
			roadmap.reconfigure(shifted)?;
			save_roadmap(&roadmap_path, &roadmap)?;
			println!(
				"timeline now starts {}",
				format_fuzzy_date(f64::from(roadmap.config.start_month), roadmap.config.start_year)
			);
		}
		Command::AddStaff { name, role, org } => {
			let staff_id = roadmap.staff.add(name, role, org)?;
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("created staff member {staff_id}");
		}
		Command::RemoveStaff { id } => {
			let removed = roadmap.staff.remove(&id)?;
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("removed {}; their tasks are now unassigned", removed.name);
		}
		Command::ListStaff => {
			print_staff(&roadmap.staff);
		}
		Command::AddProject { name } => {
			let project = roadmap.add_project(name);
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("created project {project}");
		}
		Command::RenameProject { project, name } => {
			roadmap.rename_project(project, name)?;
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("renamed project {project}");
		}
		Command::RemoveProject { project } => {
			let removed = roadmap.remove_project(project)?;
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("removed project {}", removed.name);
		}
		Command::AddGoal { project, goal } => {
			roadmap.add_goal(project, goal)?;
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("added goal to project {project}");
		}
		Command::ListProjects => {
			print_projects(&roadmap);
		}
		Command::AddTask {
			project,
			name,
			start,
			start_year,
			end,
			end_year,
			lead,
			support,
		} => {
			let task = Task {
				name,
				start_month: start,
				start_year,
				end_month: end,
				end_year,
				lead: lead.map(StaffRef::from).unwrap_or(StaffRef::Unassigned),
				support: support_refs(support),
			};
			let preview = format!(
				"{} -> {}",
				format_fuzzy_date(task.start_month, task.start_year),
				format_fuzzy_date(task.end_month, task.end_year)
			);
			let task_index = roadmap.add_task(project, task)?;
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("created task {task_index} in project {project} ({preview})");
		}
		Command::EditTask {
			project,
			task,
			name,
			start,
			start_year,
			end,
			end_year,
			lead,
			support,
			clear_support,
		} => {
			let support = if clear_support {
				Some(Vec::new())
			} else if support.is_empty() {
				None
			} else {
				Some(support_refs(support))
			};
			let update = TaskUpdate {
				name,
				start_month: start,
				start_year,
				end_month: end,
				end_year,
				lead: lead.map(StaffRef::from),
				support,
			};
			let updated = roadmap.update_task(project, task, update)?;
			let preview = format!(
				"{} -> {}",
				format_fuzzy_date(updated.start_month, updated.start_year),
				format_fuzzy_date(updated.end_month, updated.end_year)
			);
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("updated task {task} in project {project} ({preview})");
		}
		Command::RemoveTask { project, task } => {
			let removed = roadmap.remove_task(project, task)?;
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("removed task {}", removed.name);
		}
		Command::AddMilestone {
			project,
			name,
			month,
			year,
			icon,
		} => {
			let preview = format_fuzzy_date(month, year);
			let milestone_index = roadmap.add_milestone(
				project,
				Milestone {
					name,
					month,
					year,
					icon,
				},
			)?;
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("created milestone {milestone_index} in project {project} ({preview})");
		}
		Command::EditMilestone {
			project,
			milestone,
			name,
			month,
			year,
			icon,
		} => {
			let update = MilestoneUpdate { name, month, year, icon };
			let updated = roadmap.update_milestone(project, milestone, update)?;
			let preview = format_fuzzy_date(updated.month, updated.year);
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("updated milestone {milestone} in project {project} ({preview})");
		}
		Command::RemoveMilestone { project, milestone } => {
			let removed = roadmap.remove_milestone(project, milestone)?;
			save_roadmap(&roadmap_path, &roadmap)?;
			println!("removed milestone {}", removed.name);
		}
		Command::Columns => {
			print_columns(&build_timeline_columns(&roadmap.config));
		}
		Command::Layout { staff, json } => {
			let filter = StaffFilter::from_option(staff);
			let layout = layout_roadmap(&roadmap, &filter, &settings.layout);
			if json {
				println!("{}", serde_json::to_string_pretty(&layout)?);
			} else {
				print_layout(&layout);
			}
		}
		Command::Export { out } => {
			export_roadmap(&out, &roadmap)?;
			println!("exported roadmap to {}", out.display());
		}
		Command::Import { from, adopt_config } => {
			let imported = import_roadmap(&from)?;
			roadmap.absorb_import(imported, adopt_config);
			save_roadmap(&roadmap_path, &roadmap)?;
			println!(
				"imported {} projects and {} staff from {}",
				roadmap.projects.len(),
				roadmap.staff.len(),
				from.display()
			);
		}
		Command::Roadmaps { .. } | Command::Preview { .. } => {}
	}

	Ok(())
}

fn init_tracing(verbose: u8, quiet: u8) -> Result<(), Box<dyn Error>> {
	let default_level = if quiet >= 2 {
		"error"
	} else if quiet == 1 {
		"warn"
	} else if verbose >= 3 {
		"trace"
	} else if verbose == 2 {
		"debug"
	} else if verbose == 1 {
		"info"
	} else {
		"warn"
	};

	let env_filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(default_level))
		.map_err(|err| format!("invalid RUST_LOG / log filter: {err}"))?;

	let init_result = tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.with_ansi(std::io::stderr().is_terminal())
		.try_init();

	if let Err(err) = init_result {
		debug!(error = %err, "tracing subscriber already set, continuing");
	}

	Ok(())
}

fn config_from_args(
	current: &TimelineConfig,
	start: Option<&str>,
	end: Option<&str>,
) -> Result<TimelineConfig, String> {
	let (start_year, start_month) = match start {
		Some(raw) => parse_year_month(raw)?,
		None => (current.start_year, current.start_month),
	};
	let (end_year, end_month) = match end {
		Some(raw) => parse_year_month(raw)?,
		None => (current.end_year, current.end_month),
	};
	Ok(TimelineConfig::new(start_year, start_month, end_year, end_month))
}

fn support_refs(ids: Vec<String>) -> Vec<SupportRef> {
	ids.into_iter()
		.map(|id| SupportRef {
			staff: StaffRef::from(id),
		})
		.collect()
}

fn print_recent_roadmaps(limit: usize) -> Result<(), Box<dyn Error>> {
	let rows = recent_roadmaps(limit)?;
	if rows.is_empty() {
		println!("no recent roadmaps");
		return Ok(());
	}

	for (index, path) in rows.iter().enumerate() {
		println!("{:>2}. {}", index + 1, path.display());
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use crate::calendar::TimelineConfig;

	use crate::domain::StaffRef;

	use super::{Cli, Command, config_from_args};

	#[test]
	fn config_args_override_only_given_ends() {
		let current = TimelineConfig::for_year(2026);
		let config = config_from_args(&current, Some("2025-10"), None).expect("valid args");
		assert_eq!(config, TimelineConfig::new(2025, 10, 2026, 12));
		assert!(config_from_args(&current, Some("2025-00"), None).is_err());
	}

	#[test]
	fn parses_task_command() {
		let cli = Cli::try_parse_from([
			"gantt-flow",
			"--roadmap",
			"plan.json",
			"add-task",
			"--project",
			"0",
			"--name",
			"Build",
			"--start",
			"3.5",
			"--start-year",
			"2026",
			"--end",
			"6",
			"--end-year",
			"2026",
			"--support",
			"a1",
			"--support",
			"b2",
		])
		.expect("arguments should parse");

		match cli.command {
			Some(Command::AddTask { start, support, lead, .. }) => {
				assert_eq!(start, 3.5);
				assert_eq!(support, vec!["a1".to_string(), "b2".to_string()]);
				assert!(lead.is_none());
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn parses_edit_task_with_partial_fields() {
		let cli = Cli::try_parse_from([
			"gantt-flow",
			"edit-task",
			"--project",
			"1",
			"--task",
			"2",
			"--end",
			"7.5",
			"--lead",
			"TBC",
			"--clear-support",
		])
		.expect("arguments should parse");

		match cli.command {
			Some(Command::EditTask {
				project,
				task,
				name,
				start,
				end,
				lead,
				clear_support,
				..
			}) => {
				assert_eq!((project, task), (1, 2));
				assert!(name.is_none() && start.is_none());
				assert_eq!(end, Some(7.5));
				assert_eq!(lead.map(StaffRef::from), Some(StaffRef::Unassigned));
				assert!(clear_support);
			}
			other => panic!("unexpected command: {other:?}"),
		}

		let conflicting = Cli::try_parse_from([
			"gantt-flow",
			"edit-task",
			"--project",
			"0",
			"--task",
			"0",
			"--support",
			"a1",
			"--clear-support",
		]);
		assert!(conflicting.is_err());
	}

	#[test]
	fn parses_edit_milestone() {
		let cli = Cli::try_parse_from([
			"gantt-flow",
			"edit-milestone",
			"--project",
			"0",
			"--milestone",
			"3",
			"--month",
			"11.8",
		])
		.expect("arguments should parse");
		assert!(matches!(
			cli.command,
			Some(Command::EditMilestone { milestone: 3, month: Some(month), year: None, .. }) if month == 11.8
		));
	}

	#[test]
	fn preview_accepts_negative_values() {
		let cli = Cli::try_parse_from(["gantt-flow", "preview", "--value", "-1.5", "--year", "2025"])
			.expect("arguments should parse");
		assert!(matches!(cli.command, Some(Command::Preview { value, year: 2025 }) if value == -1.5));
	}
}
