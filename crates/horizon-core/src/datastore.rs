use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::task::StoredTask;

const TASKS_FILE: &str = "tasks.data";

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join(TASKS_FILE);
        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<Vec<StoredTask>> {
        load_jsonl(&self.tasks_path).with_context(|| format!("failed to load {TASKS_FILE}"))
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save(&self, tasks: &[StoredTask]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks)
            .with_context(|| format!("failed to save {TASKS_FILE}"))
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    pub fn add(&self, task: StoredTask) -> anyhow::Result<Vec<StoredTask>> {
        let mut tasks = self.load()?;
        tasks.push(task);
        self.save(&tasks)?;
        Ok(tasks)
    }

    /// Loads all tasks, lets `edit` change the one matching `id_prefix`, then
    /// saves. Nothing is written when `edit` fails.
    #[tracing::instrument(skip(self, edit))]
    pub fn update<F>(&self, id_prefix: &str, edit: F) -> anyhow::Result<StoredTask>
    where
        F: FnOnce(&mut StoredTask) -> anyhow::Result<()>,
    {
        let mut tasks = self.load()?;
        let idx = find_by_prefix(&tasks, id_prefix)?;
        edit(&mut tasks[idx])?;
        let updated = tasks[idx].clone();
        self.save(&tasks)?;
        Ok(updated)
    }
}

/// Index of the single task whose id starts with `prefix`.
pub fn find_by_prefix(tasks: &[StoredTask], prefix: &str) -> anyhow::Result<usize> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(anyhow!("task id cannot be empty"));
    }

    let mut matches = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| task.id.starts_with(prefix))
        .map(|(idx, _)| idx);

    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no task matches id {prefix}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("id {prefix} matches more than one task"));
    }
    Ok(first)
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<StoredTask>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: StoredTask = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[StoredTask]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn add_then_update_by_prefix() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        assert!(store.load().expect("load empty").is_empty());

        let task = StoredTask::new("Call the bank".to_string(), Utc::now());
        let id = task.id.clone();
        store.add(task).expect("add task");

        let updated = store
            .update(&id[..6], |task| {
                task.date = Some("2026-02-10".to_string());
                Ok(())
            })
            .expect("update task");
        assert_eq!(updated.date.as_deref(), Some("2026-02-10"));

        let reloaded = store.load().expect("reload");
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].date.as_deref(), Some("2026-02-10"));
    }

    #[test]
    fn failed_edit_writes_nothing() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let task = StoredTask::new("Pay rent".to_string(), Utc::now());
        let id = task.id.clone();
        store.add(task).expect("add task");

        let result = store.update(&id, |task| {
            task.title = "changed".to_string();
            Err(anyhow!("refused"))
        });
        assert!(result.is_err());
        assert_eq!(store.load().expect("reload")[0].title, "Pay rent");
    }

    #[test]
    fn prefix_lookup_rejects_ambiguity() {
        let now = Utc::now();
        let mut a = StoredTask::new("a".to_string(), now);
        a.id = "abc-1".to_string();
        let mut b = StoredTask::new("b".to_string(), now);
        b.id = "abc-2".to_string();
        let tasks = vec![a, b];

        assert!(find_by_prefix(&tasks, "abc").is_err());
        assert_eq!(find_by_prefix(&tasks, "abc-2").expect("unique"), 1);
        assert!(find_by_prefix(&tasks, "zzz").is_err());
        assert!(find_by_prefix(&tasks, " ").is_err());
    }

    #[test]
    fn reports_bad_lines() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        fs::write(&store.tasks_path, "{\"id\":\"x\",\"title\":\"ok\"}\nnot json\n")
            .expect("write tasks");

        let err = store.load().expect_err("bad line");
        assert!(format!("{err:#}").contains("line 2"));
    }
}
