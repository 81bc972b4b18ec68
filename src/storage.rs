use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::domain::Roadmap;

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    JsonDecode(serde_json::Error),
    JsonEncode(serde_json::Error),
    TomlDecode(toml::de::Error),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::JsonDecode(err) => write!(f, "failed to parse roadmap JSON: {err}"),
            StorageError::JsonEncode(err) => write!(f, "failed to encode roadmap JSON: {err}"),
            StorageError::TomlDecode(err) => write!(f, "failed to parse settings TOML: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Loads the roadmap at `path`; a missing or blank file is a fresh roadmap.
pub fn load_roadmap(path: &Path) -> Result<Roadmap, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "roadmap file missing, starting empty");
            return Ok(Roadmap::default());
        }
        Err(err) => return Err(StorageError::Io(err)),
    };

    if raw.trim().is_empty() {
        return Ok(Roadmap::default());
    }

    let mut roadmap = parse_roadmap(&raw)?;
    roadmap.staff.refresh_presentation();
    debug!(
        path = %path.display(),
        projects = roadmap.projects.len(),
        staff = roadmap.staff.len(),
        "loaded roadmap"
    );
    Ok(roadmap)
}

pub fn save_roadmap(path: &Path, roadmap: &Roadmap) -> Result<(), StorageError> {
    write_json(path, roadmap)?;
    debug!(path = %path.display(), "saved roadmap");
    Ok(())
}

/// Reads an exported document. Unlike [`load_roadmap`] the file must exist.
pub fn import_roadmap(path: &Path) -> Result<Roadmap, StorageError> {
    let raw = fs::read_to_string(path).map_err(StorageError::Io)?;
    let roadmap = parse_roadmap(&raw)?;
    info!(path = %path.display(), projects = roadmap.projects.len(), "imported roadmap");
    Ok(roadmap)
}

pub fn export_roadmap(path: &Path, roadmap: &Roadmap) -> Result<(), StorageError> {
    write_json(path, roadmap)?;
    info!(path = %path.display(), "exported roadmap");
    Ok(())
}

fn parse_roadmap(raw: &str) -> Result<Roadmap, StorageError> {
    serde_json::from_str(raw).map_err(StorageError::JsonDecode)
}

fn write_json(path: &Path, roadmap: &Roadmap) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }
    }

    let body = serde_json::to_string_pretty(roadmap).map_err(StorageError::JsonEncode)?;
    let mut file = fs::File::create(path).map_err(StorageError::Io)?;
    file.write_all(body.as_bytes()).map_err(StorageError::Io)?;
    file.write_all(b"\n").map_err(StorageError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use crate::calendar::TimelineConfig;
    use crate::domain::{Milestone, MilestoneUpdate, Roadmap, StaffRef, SupportRef, Task, TaskUpdate};

    use super::{StorageError, export_roadmap, import_roadmap, load_roadmap, save_roadmap};

    #[test]
    fn round_trips_roadmap_json() {
        let mut roadmap = Roadmap::new(TimelineConfig::new(2025, 6, 2026, 5));
        let ada = roadmap
            .staff
            .add("Ada Lovelace".to_string(), "Engineer".to_string(), false)
            .expect("staff should be created");
        let project = roadmap.add_project("Engine".to_string());
        roadmap
            .add_task(
                project,
                Task {
                    name: "Design".to_string(),
                    start_month: 6.5,
                    start_year: 2025,
                    end_month: 9.0,
                    end_year: 2025,
                    lead: StaffRef::Staff(ada.clone()),
                    support: vec![SupportRef {
                        staff: StaffRef::Unassigned,
                    }],
                },
            )
            .expect("task should be added");
        roadmap
            .add_milestone(
                project,
                Milestone {
                    name: "Launch".to_string(),
                    month: 1.0,
                    year: 2026,
                    icon: Some("rocket".to_string()),
                },
            )
            .expect("milestone should be added");

        let path = temp_file("gantt_flow_roundtrip.json");
        save_roadmap(&path, &roadmap).expect("save should succeed");
        let raw = fs::read_to_string(&path).expect("file should exist");
        assert!(raw.contains("\"startMonth\": 6.5"));
        assert!(raw.contains(&format!("\"lead\": \"{ada}\"")));
        assert!(raw.contains("\"staff\": \"TBC\""));

        let loaded = load_roadmap(&path).expect("load should succeed");
        assert_eq!(loaded.config, TimelineConfig::new(2025, 6, 2026, 5));
        assert_eq!(loaded.projects.len(), 1);
        assert_eq!(loaded.projects[0].tasks[0].lead, StaffRef::Staff(ada));
        assert_eq!(loaded.projects[0].milestones[0].icon.as_deref(), Some("rocket"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_empty_roadmap() {
        let path = temp_file("gantt_flow_missing.json");
        let _ = fs::remove_file(&path);
        let roadmap = load_roadmap(&path).expect("missing file should load");
        assert!(roadmap.projects.is_empty());
        assert!(import_roadmap(&path).is_err());
    }

    #[test]
    fn accepts_browser_exports_with_placeholder_staff() {
        let raw = r##"{
            "config": {"startYear": 2026, "startMonth": 1, "endYear": 2026, "endMonth": 12},
            "staff": {
                "TBC": {"name": "Unassigned", "color": "#64748b", "displayInitials": "TBC"},
                "id_1": {"name": "Grace Hopper", "role": "Member", "isOrg": false}
            },
            "projects": [{"name": "Compiler", "tasks": [], "milestones": [{"name": "Beta", "month": 4.5, "year": 2026}]}]
        }"##;
        let path = temp_file("gantt_flow_browser_export.json");
        fs::write(&path, raw).expect("write fixture");

        let loaded = load_roadmap(&path).expect("load should succeed");
        assert_eq!(loaded.staff.len(), 1);
        assert_eq!(
            loaded
                .staff
                .get("id_1")
                .and_then(|member| member.display_initials.as_deref()),
            Some("GH")
        );
        assert!(loaded.projects[0].goals.is_empty());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn export_then_import_preserves_projects() {
        let mut roadmap = Roadmap::new(TimelineConfig::for_year(2027));
        roadmap.add_project("Exported".to_string());
        roadmap
            .add_goal(0, "Ship it".to_string())
            .expect("goal should be added");

        let path = temp_file("gantt_flow_export.json");
        export_roadmap(&path, &roadmap).expect("export should succeed");
        let imported = import_roadmap(&path).expect("import should succeed");
        assert_eq!(imported.projects[0].goals, vec!["Ship it".to_string()]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn rejected_non_finite_months_keep_the_file_loadable() {
        let mut roadmap = Roadmap::new(TimelineConfig::for_year(2026));
        let project = roadmap.add_project("Launch".to_string());
        let milestone = |month: f64| Milestone {
            name: "Go live".to_string(),
            month,
            year: 2026,
            icon: None,
        };
        assert!(roadmap.add_milestone(project, milestone("NaN".parse().expect("NaN parses"))).is_err());
        roadmap
            .add_milestone(project, milestone(3.5))
            .expect("finite month should be added");
        let update = MilestoneUpdate {
            month: Some("inf".parse().expect("inf parses")),
            ..MilestoneUpdate::default()
        };
        assert!(roadmap.update_milestone(project, 0, update).is_err());
        let update = TaskUpdate {
            end_month: Some(f64::NAN),
            ..TaskUpdate::default()
        };
        assert!(roadmap.update_task(project, 0, update).is_err());

        let path = temp_file("gantt_flow_finite.json");
        save_roadmap(&path, &roadmap).expect("save should succeed");
        let raw = fs::read_to_string(&path).expect("file should exist");
        assert!(!raw.contains("null"));

        let loaded = load_roadmap(&path).expect("load should succeed");
        assert_eq!(loaded.projects[0].milestones.len(), 1);
        assert_eq!(loaded.projects[0].milestones[0].month, 3.5);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn edited_task_round_trips() {
        let mut roadmap = Roadmap::new(TimelineConfig::for_year(2026));
        let grace = roadmap
            .staff
            .add("Grace Hopper".to_string(), "Engineer".to_string(), false)
            .expect("staff should be created");
        let project = roadmap.add_project("Compiler".to_string());
        roadmap
            .add_task(
                project,
                Task {
                    name: "Parser".to_string(),
                    start_month: 1.0,
                    start_year: 2026,
                    end_month: 3.0,
                    end_year: 2026,
                    lead: StaffRef::Unassigned,
                    support: Vec::new(),
                },
            )
            .expect("task should be added");
        roadmap
            .update_task(
                project,
                0,
                TaskUpdate {
                    start_month: Some(2.4),
                    lead: Some(StaffRef::Staff(grace.clone())),
                    ..TaskUpdate::default()
                },
            )
            .expect("update should succeed");

        let path = temp_file("gantt_flow_edited.json");
        save_roadmap(&path, &roadmap).expect("save should succeed");
        let loaded = load_roadmap(&path).expect("load should succeed");
        let task = &loaded.projects[0].tasks[0];
        assert_eq!(task.start_month, 2.4);
        assert_eq!(task.lead, StaffRef::Staff(grace));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn reports_malformed_json() {
        let path = temp_file("gantt_flow_malformed.json");
        fs::write(&path, "{ not json").expect("write fixture");
        let err = load_roadmap(&path).expect_err("malformed file should fail");
        assert!(matches!(err, StorageError::JsonDecode(_)));
        assert!(err.to_string().starts_with("failed to parse roadmap JSON"));
        let _ = fs::remove_file(path);
    }

    fn temp_file(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("{}_{}", name, std::process::id()));
        path
    }
}
