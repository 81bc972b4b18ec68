use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{TimelineColumn, TimelineConfig, build_timeline_columns, view_position};
use crate::domain::{Milestone, Party, Project, Roadmap, StaffFilter, StaffRegistry, Task};

/// Pixel constants driving lane spacing and the inside/outside label
/// decision. Every field can be overridden from the `[layout]` settings
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutMetrics {
    pub base_offset_px: u32,
    pub lane_height_px: u32,
    pub min_row_height_px: u32,
    pub row_padding_px: u32,
    pub lead_badge_px: f64,
    pub collaborator_badge_px: f64,
    pub badge_margin_px: f64,
    pub badge_slack_px: f64,
    pub char_width_px: f64,
    pub column_width_px: f64,
    pub min_grid_width_px: f64,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            base_offset_px: 20,
            lane_height_px: 65,
            min_row_height_px: 120,
            row_padding_px: 40,
            lead_badge_px: 28.0,
            collaborator_badge_px: 24.0,
            badge_margin_px: 20.0,
            badge_slack_px: 10.0,
            char_width_px: 7.5,
            column_width_px: 130.0,
            min_grid_width_px: 1600.0,
        }
    }
}

impl LayoutMetrics {
    pub fn grid_width_px(&self, total_columns: usize) -> f64 {
        self.min_grid_width_px
            .max(total_columns as f64 * self.column_width_px)
    }

    pub fn lane_top_px(&self, lane: usize) -> u32 {
        let lane = u32::try_from(lane).unwrap_or(u32::MAX);
        self.base_offset_px
            .saturating_add(lane.saturating_mul(self.lane_height_px))
    }

    pub fn row_height_px(&self, item_count: usize) -> u32 {
        let count = u32::try_from(item_count).unwrap_or(u32::MAX);
        count
            .saturating_mul(self.lane_height_px)
            .saturating_add(self.row_padding_px)
            .max(self.min_row_height_px)
    }

    pub fn badge_width_px(&self, collaborators: usize) -> f64 {
        self.lead_badge_px + collaborators as f64 * self.collaborator_badge_px + self.badge_margin_px
    }

    pub fn text_width_px(&self, lines: &[&str]) -> f64 {
        let widest = lines
            .iter()
            .map(|line| UnicodeWidthStr::width(*line))
            .max()
            .unwrap_or(0);
        widest as f64 * self.char_width_px
    }
}

/// Declaration order is the tie-break order for items sharing a start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Milestone,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutGeometry {
    pub left_percent: f64,
    pub width_percent: Option<f64>,
    pub top_px: u32,
    pub label_outside: bool,
    pub badges_outside: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamBadges {
    pub lead: Party,
    pub support: Vec<Party>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedItem {
    pub kind: ItemKind,
    /// Index into the project's task or milestone list.
    pub source_index: usize,
    pub name: String,
    pub icon: Option<String>,
    pub lane: usize,
    pub view_start: f64,
    pub view_end: Option<f64>,
    pub geometry: LayoutGeometry,
    pub team: Option<TeamBadges>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowLayout {
    pub items: Vec<PlacedItem>,
    pub row_height_px: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRow {
    pub project_index: usize,
    pub name: String,
    pub layout: RowLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineLayout {
    pub columns: Vec<TimelineColumn>,
    pub grid_width_px: f64,
    pub rows: Vec<ProjectRow>,
}

enum Source<'a> {
    Task { task: &'a Task, view_end: f64 },
    Milestone(&'a Milestone),
}

struct Candidate<'a> {
    source: Source<'a>,
    source_index: usize,
    view_start: f64,
}

impl Candidate<'_> {
    fn kind(&self) -> ItemKind {
        match self.source {
            Source::Task { .. } => ItemKind::Task,
            Source::Milestone(_) => ItemKind::Milestone,
        }
    }
}

pub fn layout_roadmap(roadmap: &Roadmap, filter: &StaffFilter, metrics: &LayoutMetrics) -> TimelineLayout {
    let columns = build_timeline_columns(&roadmap.config);
    let total_columns = columns.len();
    let grid_width_px = metrics.grid_width_px(total_columns);

    let rows = roadmap
        .projects
        .iter()
        .enumerate()
        .filter(|(_, project)| filter.shows(project))
        .map(|(project_index, project)| ProjectRow {
            project_index,
            name: project.name.clone(),
            layout: layout_project_row(
                project,
                &roadmap.staff,
                &roadmap.config,
                total_columns,
                grid_width_px,
                metrics,
            ),
        })
        .collect();

    TimelineLayout {
        columns,
        grid_width_px,
        rows,
    }
}

pub fn layout_project_row(
    project: &Project,
    staff: &StaffRegistry,
    config: &TimelineConfig,
    total_columns: usize,
    pixel_width: f64,
    metrics: &LayoutMetrics,
) -> RowLayout {
    if total_columns == 0 {
        return RowLayout {
            items: Vec::new(),
            row_height_px: metrics.row_height_px(0),
        };
    }

    let mut candidates = collect_visible(project, config, total_columns);
    candidates.sort_by(compare_candidates);

    let columns = total_columns as f64;
    let items = candidates
        .into_iter()
        .enumerate()
        .map(|(lane, candidate)| {
            let left_percent = (candidate.view_start - 1.0) / columns * 100.0;
            let top_px = metrics.lane_top_px(lane);
            match candidate.source {
                Source::Task { task, view_end } => {
                    let width_percent = (view_end - candidate.view_start) / columns * 100.0;
                    let team = team_badges(task, staff);
                    let fit = fit_content(
                        width_percent / 100.0 * pixel_width,
                        task.support.len(),
                        &[task.name.as_str(), team.summary.as_str()],
                        metrics,
                    );
                    PlacedItem {
                        kind: ItemKind::Task,
                        source_index: candidate.source_index,
                        name: task.name.clone(),
                        icon: None,
                        lane,
                        view_start: candidate.view_start,
                        view_end: Some(view_end),
                        geometry: LayoutGeometry {
                            left_percent,
                            width_percent: Some(width_percent),
                            top_px,
                            label_outside: fit.label_outside,
                            badges_outside: fit.badges_outside,
                        },
                        team: Some(team),
                    }
                }
                Source::Milestone(milestone) => PlacedItem {
                    kind: ItemKind::Milestone,
                    source_index: candidate.source_index,
                    name: milestone.name.clone(),
                    icon: milestone.icon.clone(),
                    lane,
                    view_start: candidate.view_start,
                    view_end: None,
                    geometry: LayoutGeometry {
                        left_percent,
                        width_percent: None,
                        top_px,
                        label_outside: true,
                        badges_outside: false,
                    },
                    team: None,
                },
            }
        })
        .collect::<Vec<_>>();

    RowLayout {
        row_height_px: metrics.row_height_px(items.len()),
        items,
    }
}

fn collect_visible<'a>(
    project: &'a Project,
    config: &TimelineConfig,
    total_columns: usize,
) -> Vec<Candidate<'a>> {
    // A start at exactly `total_columns + 1` sits on the right edge of the
    // grid and is dropped; anything inside the final column stays.
    let right_edge = total_columns as f64 + 1.0;
    let mut candidates = Vec::with_capacity(project.tasks.len() + project.milestones.len());

    for (source_index, task) in project.tasks.iter().enumerate() {
        let view_start = view_position(task.start_month, task.start_year, config);
        let view_end = view_position(task.end_month, task.end_year, config);
        if view_end < 1.0 || view_start >= right_edge || view_start.is_nan() || view_end.is_nan() {
            debug!(project = %project.name, task = %task.name, view_start, view_end, "task outside timeline");
            continue;
        }
        candidates.push(Candidate {
            source: Source::Task { task, view_end },
            source_index,
            view_start,
        });
    }

    for (source_index, milestone) in project.milestones.iter().enumerate() {
        let view_start = view_position(milestone.month, milestone.year, config);
        if view_start < 1.0 || view_start >= right_edge || view_start.is_nan() {
            debug!(project = %project.name, milestone = %milestone.name, view_start, "milestone outside timeline");
            continue;
        }
        candidates.push(Candidate {
            source: Source::Milestone(milestone),
            source_index,
            view_start,
        });
    }

    candidates
}

fn compare_candidates(left: &Candidate<'_>, right: &Candidate<'_>) -> Ordering {
    left.view_start
        .total_cmp(&right.view_start)
        .then_with(|| left.kind().cmp(&right.kind()))
}

fn team_badges(task: &Task, staff: &StaffRegistry) -> TeamBadges {
    let lead = staff.resolve(&task.lead);
    let support = task
        .support
        .iter()
        .map(|support| staff.resolve(&support.staff))
        .collect::<Vec<_>>();

    let mut summary = lead.first_name().to_string();
    if !support.is_empty() {
        let names = support
            .iter()
            .map(|party| party.first_name())
            .collect::<Vec<_>>()
            .join(", ");
        summary.push_str(" + ");
        summary.push_str(&names);
    }

    TeamBadges {
        lead,
        support,
        summary,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentFit {
    pub label_outside: bool,
    pub badges_outside: bool,
}

/// Decides where badges and label go for a bar `bar_px` wide. Narrower bars
/// only ever move content outward.
pub fn fit_content(bar_px: f64, collaborators: usize, lines: &[&str], metrics: &LayoutMetrics) -> ContentFit {
    let badge_width = metrics.badge_width_px(collaborators);
    let text_width = metrics.text_width_px(lines);
    // NaN widths compare false everywhere; treat them as zero-width bars.
    let bar_px = if bar_px.is_nan() { 0.0 } else { bar_px };
    ContentFit {
        badges_outside: bar_px < badge_width - metrics.badge_slack_px,
        label_outside: bar_px < badge_width + text_width,
    }
}
