use std::collections::BTreeMap;

use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};

use crate::calendar::TimelineConfig;

const ID_LEN: usize = 8;

pub const UNASSIGNED_ID: &str = "TBC";
pub const UNASSIGNED_NAME: &str = "Unassigned";
pub const UNASSIGNED_COLOR: &str = "#64748b";

pub const PALETTE: [&str; 10] = [
    "#f94144", "#f3722c", "#f8961e", "#f9844a", "#f9c74f", "#90be6d", "#43aa8b", "#4d908e",
    "#577590", "#277da1",
];

/// Persisted reference to a staff entry. `"TBC"` on disk means nobody owns
/// the task yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StaffRef {
    Unassigned,
    Staff(String),
}

impl From<String> for StaffRef {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == UNASSIGNED_ID {
            StaffRef::Unassigned
        } else {
            StaffRef::Staff(trimmed.to_string())
        }
    }
}

impl From<StaffRef> for String {
    fn from(value: StaffRef) -> Self {
        match value {
            StaffRef::Unassigned => UNASSIGNED_ID.to_string(),
            StaffRef::Staff(id) => id,
        }
    }
}

impl StaffRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            StaffRef::Unassigned => None,
            StaffRef::Staff(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Owner {
    Unassigned,
    Person(String),
    Organisation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_initials: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_org: bool,
}

impl StaffMember {
    fn surname_key(&self) -> String {
        self.name
            .split_whitespace()
            .last()
            .unwrap_or_default()
            .to_lowercase()
    }
}

/// A staff entry resolved for display; unknown ids come back as the
/// unassigned placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Party {
    pub owner: Owner,
    pub name: String,
    pub initials: String,
    pub color: String,
}

impl Party {
    pub fn unassigned() -> Self {
        Self {
            owner: Owner::Unassigned,
            name: UNASSIGNED_NAME.to_string(),
            initials: UNASSIGNED_ID.to_string(),
            color: UNASSIGNED_COLOR.to_string(),
        }
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("?")
    }

    pub fn is_unassigned(&self) -> bool {
        self.owner == Owner::Unassigned
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffRegistry {
    members: BTreeMap<String, StaffMember>,
}

impl StaffRegistry {
    pub fn get(&self, id: &str) -> Option<&StaffMember> {
        self.members.get(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn resolve(&self, reference: &StaffRef) -> Party {
        let Some(id) = reference.id() else {
            return Party::unassigned();
        };
        let Some(member) = self.members.get(id) else {
            return Party::unassigned();
        };

        let owner = if member.is_org {
            Owner::Organisation(id.to_string())
        } else {
            Owner::Person(id.to_string())
        };
        Party {
            owner,
            name: member.name.clone(),
            initials: member
                .display_initials
                .clone()
                .unwrap_or_else(|| initials_for(&member.name)),
            color: member
                .color
                .clone()
                .unwrap_or_else(|| UNASSIGNED_COLOR.to_string()),
        }
    }

    /// Members ordered by surname, ties broken by id.
    pub fn sorted_by_surname(&self) -> Vec<(&str, &StaffMember)> {
        let mut rows = self
            .members
            .iter()
            .map(|(id, member)| (id.as_str(), member))
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| {
            left.1
                .surname_key()
                .cmp(&right.1.surname_key())
                .then_with(|| left.0.cmp(right.0))
        });
        rows
    }

    pub fn add(&mut self, name: String, role: String, is_org: bool) -> Result<String, String> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err("staff name cannot be empty".to_string());
        }

        let mut id = generate_id();
        while self.members.contains_key(&id) || id == UNASSIGNED_ID {
            id = generate_id();
        }
        self.members.insert(
            id.clone(),
            StaffMember {
                name,
                role,
                color: None,
                display_initials: None,
                is_org,
            },
        );
        self.refresh_presentation();
        Ok(id)
    }

    pub fn remove(&mut self, id: &str) -> Result<StaffMember, String> {
        let removed = self
            .members
            .remove(id)
            .ok_or_else(|| format!("staff member not found: {id}"))?;
        self.refresh_presentation();
        Ok(removed)
    }

    /// Reassigns palette colors in surname order and recomputes initials.
    /// The placeholder entry some exported files carry is dropped; it is
    /// built in.
    pub fn refresh_presentation(&mut self) {
        self.members.remove(UNASSIGNED_ID);
        let order = self
            .sorted_by_surname()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect::<Vec<_>>();

        for (index, id) in order.iter().enumerate() {
            if let Some(member) = self.members.get_mut(id) {
                member.color = Some(PALETTE[index % PALETTE.len()].to_string());
                member.display_initials = Some(initials_for(&member.name));
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportRef {
    pub staff: StaffRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub name: String,
    pub start_month: f64,
    pub start_year: i32,
    pub end_month: f64,
    pub end_year: i32,
    #[serde(default = "unassigned_ref")]
    pub lead: StaffRef,
    #[serde(default)]
    pub support: Vec<SupportRef>,
}

impl Task {
    pub fn involves(&self, staff_id: &str) -> bool {
        self.lead.id() == Some(staff_id)
            || self
                .support
                .iter()
                .any(|support| support.staff.id() == Some(staff_id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub month: f64,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub goals: Vec<String>,
}

impl Project {
    pub fn new(name: String) -> Self {
        Self {
            name,
            tasks: Vec::new(),
            milestones: Vec::new(),
            goals: Vec::new(),
        }
    }
}

/// Field changes for [`Roadmap::update_task`]; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub start_month: Option<f64>,
    pub start_year: Option<i32>,
    pub end_month: Option<f64>,
    pub end_year: Option<i32>,
    pub lead: Option<StaffRef>,
    pub support: Option<Vec<SupportRef>>,
}

impl TaskUpdate {
    fn apply(self, task: &mut Task) {
        if let Some(name) = self.name {
            task.name = name;
        }
        if let Some(month) = self.start_month {
            task.start_month = month;
        }
        if let Some(year) = self.start_year {
            task.start_year = year;
        }
        if let Some(month) = self.end_month {
            task.end_month = month;
        }
        if let Some(year) = self.end_year {
            task.end_year = year;
        }
        if let Some(lead) = self.lead {
            task.lead = lead;
        }
        if let Some(support) = self.support {
            task.support = support;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MilestoneUpdate {
    pub name: Option<String>,
    pub month: Option<f64>,
    pub year: Option<i32>,
    pub icon: Option<String>,
}

impl MilestoneUpdate {
    fn apply(self, milestone: &mut Milestone) {
        if let Some(name) = self.name {
            milestone.name = name;
        }
        if let Some(month) = self.month {
            milestone.month = month;
        }
        if let Some(year) = self.year {
            milestone.year = year;
        }
        if let Some(icon) = self.icon {
            milestone.icon = Some(icon);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffFilter {
    All,
    Staff(String),
}

impl StaffFilter {
    pub fn from_option(staff_id: Option<String>) -> Self {
        match staff_id {
            Some(id) if id != "ALL" => StaffFilter::Staff(id),
            _ => StaffFilter::All,
        }
    }

    pub fn shows(&self, project: &Project) -> bool {
        match self {
            StaffFilter::All => true,
            StaffFilter::Staff(id) => project.tasks.iter().any(|task| task.involves(id)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roadmap {
    #[serde(default)]
    pub config: TimelineConfig,
    #[serde(default)]
    pub staff: StaffRegistry,
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Default for Roadmap {
    fn default() -> Self {
        Self::new(TimelineConfig::default())
    }
}

impl Roadmap {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            config,
            staff: StaffRegistry::default(),
            projects: Vec::new(),
        }
    }

    fn project_mut(&mut self, index: usize) -> Result<&mut Project, String> {
        self.projects
            .get_mut(index)
            .ok_or_else(|| format!("project not found: {index}"))
    }

    pub fn reconfigure(&mut self, config: TimelineConfig) -> Result<(), String> {
        for month in [config.start_month, config.end_month] {
            if !(1..=12).contains(&month) {
                return Err(format!("month out of range: {month}"));
            }
        }
        if config.column_count() == 0 {
            return Err("timeline end must not precede its start".to_string());
        }
        self.config = config;
        Ok(())
    }

    pub fn add_project(&mut self, name: String) -> usize {
        self.projects.push(Project::new(name));
        self.projects.len() - 1
    }

    pub fn rename_project(&mut self, index: usize, name: String) -> Result<(), String> {
        self.project_mut(index)?.name = name;
        Ok(())
    }

    pub fn remove_project(&mut self, index: usize) -> Result<Project, String> {
        if index >= self.projects.len() {
            return Err(format!("project not found: {index}"));
        }
        Ok(self.projects.remove(index))
    }

    pub fn add_goal(&mut self, project_index: usize, goal: String) -> Result<(), String> {
        self.project_mut(project_index)?.goals.push(goal);
        Ok(())
    }

    pub fn add_task(&mut self, project_index: usize, task: Task) -> Result<usize, String> {
        self.validate_task(&task)?;
        let project = self.project_mut(project_index)?;
        project.tasks.push(task);
        Ok(project.tasks.len() - 1)
    }

    /// Applies `update` in place, so the task keeps its index. Nothing
    /// changes when any updated field is invalid.
    pub fn update_task(
        &mut self,
        project_index: usize,
        task_index: usize,
        update: TaskUpdate,
    ) -> Result<&Task, String> {
        let mut task = self
            .project_mut(project_index)?
            .tasks
            .get(task_index)
            .cloned()
            .ok_or_else(|| format!("task not found: {task_index}"))?;
        update.apply(&mut task);
        self.validate_task(&task)?;

        let slot = self
            .project_mut(project_index)?
            .tasks
            .get_mut(task_index)
            .ok_or_else(|| format!("task not found: {task_index}"))?;
        *slot = task;
        Ok(&*slot)
    }

    pub fn remove_task(&mut self, project_index: usize, task_index: usize) -> Result<Task, String> {
        let project = self.project_mut(project_index)?;
        if task_index >= project.tasks.len() {
            return Err(format!("task not found: {task_index}"));
        }
        Ok(project.tasks.remove(task_index))
    }

    pub fn add_milestone(
        &mut self,
        project_index: usize,
        milestone: Milestone,
    ) -> Result<usize, String> {
        ensure_finite("month", milestone.month)?;
        let project = self.project_mut(project_index)?;
        project.milestones.push(milestone);
        Ok(project.milestones.len() - 1)
    }

    pub fn update_milestone(
        &mut self,
        project_index: usize,
        milestone_index: usize,
        update: MilestoneUpdate,
    ) -> Result<&Milestone, String> {
        if let Some(month) = update.month {
            ensure_finite("month", month)?;
        }
        let milestone = self
            .project_mut(project_index)?
            .milestones
            .get_mut(milestone_index)
            .ok_or_else(|| format!("milestone not found: {milestone_index}"))?;
        update.apply(milestone);
        Ok(&*milestone)
    }

    fn validate_task(&self, task: &Task) -> Result<(), String> {
        ensure_finite("start month", task.start_month)?;
        ensure_finite("end month", task.end_month)?;
        for reference in std::iter::once(&task.lead).chain(task.support.iter().map(|s| &s.staff)) {
            if let Some(id) = reference.id() {
                if self.staff.get(id).is_none() {
                    return Err(format!("staff member not found: {id}"));
                }
            }
        }
        Ok(())
    }

    pub fn remove_milestone(
        &mut self,
        project_index: usize,
        milestone_index: usize,
    ) -> Result<Milestone, String> {
        let project = self.project_mut(project_index)?;
        if milestone_index >= project.milestones.len() {
            return Err(format!("milestone not found: {milestone_index}"));
        }
        Ok(project.milestones.remove(milestone_index))
    }

    /// Replaces staff and projects with an imported document. The current
    /// timeline window is kept unless `adopt_config` is set.
    pub fn absorb_import(&mut self, imported: Roadmap, adopt_config: bool) {
        self.staff = imported.staff;
        self.projects = imported.projects;
        if adopt_config {
            self.config = imported.config;
        }
        self.staff.refresh_presentation();
    }
}

pub fn initials_for(name: &str) -> String {
    let parts = name.split_whitespace().collect::<Vec<_>>();
    let base = match parts.as_slice() {
        [] => String::new(),
        [single] => single.chars().take(2).collect(),
        [first, .., last] => first
            .chars()
            .take(1)
            .chain(last.chars().take(1))
            .collect(),
    };
    base.to_uppercase()
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

// JSON has no NaN or infinity, so such months would not survive a save.
fn ensure_finite(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(format!("{field} must be a finite number, got {value}"))
    }
}

fn unassigned_ref() -> StaffRef {
    StaffRef::Unassigned
}
