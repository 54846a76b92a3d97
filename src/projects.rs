//! Project listing over the output root.

use std::io::ErrorKind;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::AppError;

/// One job directory as shown to the front-end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectEntry {
    pub id: String,
    pub name: String,
    /// Creation time in seconds since the Unix epoch.
    pub date: f64,
}

impl ProjectEntry {
    pub fn new(id: impl Into<String>, date: f64) -> Self {
        let id = id.into();
        let name = id.replace('_', " ");
        Self { id, name, date }
    }
}

/// Lists immediate subdirectories of `output_root`, newest first.
///
/// A missing root yields an empty list.
pub async fn list_projects(output_root: &Path) -> Result<Vec<ProjectEntry>, AppError> {
    let mut entries = match tokio::fs::read_dir(output_root).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(AppError::internal(format!(
                "failed to read {:?}: {err}",
                output_root
            )))
        }
    };

    let mut projects = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| AppError::internal(format!("failed to read {:?}: {err}", output_root)))?
    {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_dir() {
            continue;
        }
        let created = meta.created().or_else(|_| meta.modified()).ok();
        projects.push(ProjectEntry::new(
            entry.file_name().to_string_lossy().into_owned(),
            created.map(epoch_seconds).unwrap_or(0.0),
        ));
    }

    sort_newest_first(&mut projects);
    Ok(projects)
}

/// Orders entries by `date` descending, ties broken by id.
pub fn sort_newest_first(projects: &mut [ProjectEntry]) {
    projects.sort_by(|a, b| b.date.total_cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
}

fn epoch_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn display_name_replaces_underscores() {
        let entry = ProjectEntry::new("my_first_song", 1.0);
        assert_eq!(entry.name, "my first song");
        assert_eq!(entry.id, "my_first_song");
    }

    #[test]
    fn sorts_by_date_descending() {
        let mut projects = vec![
            ProjectEntry::new("old", 10.0),
            ProjectEntry::new("new", 30.0),
            ProjectEntry::new("mid", 20.0),
        ];
        sort_newest_first(&mut projects);
        let ids = projects.iter().map(|p| p.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn missing_root_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let projects = list_projects(&dir.path().join("separated"))
            .await
            .expect("list");
        assert!(projects.is_empty());
    }

    #[tokio::test]
    async fn lists_directories_newest_first_and_skips_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("first_song")).expect("mkdir");
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::create_dir(dir.path().join("second_song")).expect("mkdir");
        std::fs::write(dir.path().join("stray.txt"), b"x").expect("write");

        let projects = list_projects(dir.path()).await.expect("list");
        let ids = projects.iter().map(|p| p.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["second_song", "first_song"]);
        assert_eq!(projects[0].name, "second song");
        assert!(projects[0].date >= projects[1].date);
    }
}
