//! Job queue and retry controller. Drives each pending task through the
//! query boundary, contains every per-task failure, and re-derives status
//! from the run logs after each pass. This module is the containment
//! boundary: nothing above it catches per-task errors.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::blacklist::Blacklist;
use crate::executor::{human_delay, QueryExecutor, QueryOutcome};
use crate::extract;
use crate::reconcile::reconcile;
use crate::report::{self, StatusReport};
use crate::runlog::{LogSource, RunLog};
use crate::tasks::Task;
use crate::validate;

pub const MAX_RETRIES: usize = 3;

/// Filesystem layout shared by the run and analyze stages.
#[derive(Debug, Clone)]
pub struct Paths {
    pub results_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub blacklist_file: PathBuf,
    pub status_file: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Paths::under(Path::new("."))
    }
}

impl Paths {
    pub fn under(root: &Path) -> Paths {
        Paths {
            results_dir: root.join("results"),
            logs_dir: root.join("logs"),
            blacklist_file: root.join("blacklist.txt"),
            status_file: root.join("search_status.txt"),
        }
    }
}

pub struct RunnerOpts {
    /// Upper bound on batch passes, and on per-name attempts across a run.
    pub max_retries: usize,
    /// Seconds slept between tasks, randomized within the bounds.
    pub pace_secs: RangeInclusive<u64>,
    /// Cap on tasks attempted per pass.
    pub limit: Option<usize>,
}

impl Default for RunnerOpts {
    fn default() -> Self {
        RunnerOpts {
            max_retries: MAX_RETRIES,
            pace_secs: 15..=45,
            limit: None,
        }
    }
}

pub struct RunSummary {
    pub passes: usize,
    pub report: StatusReport,
}

/// Run the whole batch: up to `max_retries` passes over the pending subset,
/// strictly sequential within a pass, reconciling and persisting the status
/// report after each pass and once more on the way out.
pub async fn run_batch<E, F>(
    tasks: &[Task],
    mut make_executor: F,
    paths: &Paths,
    opts: &RunnerOpts,
) -> Result<RunSummary>
where
    E: QueryExecutor,
    F: FnMut() -> Result<E>,
{
    std::fs::create_dir_all(&paths.results_dir)
        .with_context(|| format!("cannot create {}", paths.results_dir.display()))?;
    let blacklist = Blacklist::new(paths.blacklist_file.clone());
    let mut log = RunLog::create(&paths.logs_dir)?;
    // Scope decided once per run: every run log, so progress from crashed
    // runs is recovered without any other persisted state.
    let log_source = LogSource::AllRuns(paths.logs_dir.clone());

    // The retry cap is measured against occurrence counts within the input
    // list, not across passes.
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for task in tasks {
        *occurrences.entry(task.full_name()).or_default() += 1;
    }

    // Prior report is only a bootstrap default; a fresh log scan supersedes
    // it, so a crash mid-pass (report never rewritten) still resumes right.
    let mut status = report::read_report(&paths.status_file).unwrap_or_else(|e| {
        warn!("ignoring unreadable status report: {}", e);
        StatusReport::default()
    });
    let prior_lines = log_source.lines();
    if !prior_lines.is_empty() {
        status = reconcile(tasks, &prior_lines);
    }

    let mut passes = 0;
    for pass in 1..=opts.max_retries {
        let mut pending: Vec<&Task> = tasks
            .iter()
            .filter(|t| {
                let name = t.full_name();
                !status.completed.contains(&name)
                    && !status.blacklisted.contains(&name)
                    && !blacklist.contains(&name)
                    && occurrences[&name] <= opts.max_retries
            })
            .collect();
        if let Some(limit) = opts.limit {
            pending.truncate(limit);
        }
        if pending.is_empty() {
            info!("pass {}: nothing pending, stopping", pass);
            break;
        }
        passes = pass;
        info!("pass {}/{}: {} pending", pass, opts.max_retries, pending.len());

        let pb = ProgressBar::new(pending.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );

        for (i, task) in pending.iter().enumerate() {
            if let Err(e) = run_one(task, &mut make_executor, &blacklist, &mut log, paths).await {
                warn!("task {} failed: {}", task.full_name(), e);
                log.line(&format!("ERROR processing {}: {}", task.full_name(), e));
            }
            pb.inc(1);
            if i + 1 < pending.len() {
                let secs = opts.pace_secs.clone();
                human_delay(secs.start() * 1000..=secs.end() * 1000).await;
            }
        }
        pb.finish_and_clear();

        status = reconcile(tasks, &log_source.lines());
        report::write_report(&status, &paths.status_file)?;
    }

    // Best-effort final report even when no pass ran.
    status = reconcile(tasks, &log_source.lines());
    report::write_report(&status, &paths.status_file)?;

    Ok(RunSummary {
        passes,
        report: status,
    })
}

async fn run_one<E, F>(
    task: &Task,
    make_executor: &mut F,
    blacklist: &Blacklist,
    log: &mut RunLog,
    paths: &Paths,
) -> Result<()>
where
    E: QueryExecutor,
    F: FnMut() -> Result<E>,
{
    let name = task.full_name();
    let result_path = paths.results_dir.join(task.result_filename());
    validate::remove_if_junk(&result_path);

    log.line(&format!("Starting search for {}", name));
    let mut executor = make_executor()?;

    match executor.submit_query(task).await? {
        QueryOutcome::Content(html) => {
            let text = extract::extract(&html);
            if text.is_empty() || validate::is_junk_content(&text) {
                log.line(&format!("No results found for {}", name));
                return Ok(());
            }
            std::fs::write(&result_path, &text)
                .with_context(|| format!("cannot write {}", result_path.display()))?;

            // Verify the persisted artifact the same way stale files are
            // pre-cleaned; a result that is junk after filtering is removed.
            let persisted = std::fs::read_to_string(&result_path).unwrap_or_default();
            if validate::is_junk_file(&result_path) || validate::is_junk_content(&persisted) {
                let _ = std::fs::remove_file(&result_path);
                log.line(&format!("No results found for {}", name));
            } else {
                log.line(&format!("Saved results to {}", task.result_filename()));
            }
        }
        QueryOutcome::NotFound => {
            // Same-pass exclusion: later passes consult the store directly,
            // without waiting for log reconciliation.
            blacklist.add(&name)?;
            log.line(&format!("Added to blacklist: {}", name));
        }
        QueryOutcome::Transient(reason) => {
            log.line(&format!("ERROR query for {} did not complete: {}", name, reason));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::validate::JUNK_FILE_SIZE;

    /// Scripted executor: per-name queues of outcomes, plus call counts.
    #[derive(Clone, Default)]
    struct Script {
        outcomes: Arc<Mutex<HashMap<String, VecDeque<QueryOutcome>>>>,
        calls: Arc<Mutex<HashMap<String, usize>>>,
    }

    impl Script {
        fn push(&self, name: &str, outcome: QueryOutcome) {
            self.outcomes
                .lock()
                .unwrap()
                .entry(name.to_string())
                .or_default()
                .push_back(outcome);
        }

        fn calls_for(&self, name: &str) -> usize {
            *self.calls.lock().unwrap().get(name).unwrap_or(&0)
        }

        fn executor(&self) -> ScriptedExecutor {
            ScriptedExecutor {
                script: self.clone(),
            }
        }
    }

    struct ScriptedExecutor {
        script: Script,
    }

    impl QueryExecutor for ScriptedExecutor {
        async fn submit_query(&mut self, task: &Task) -> Result<QueryOutcome> {
            let name = task.full_name();
            *self.script.calls.lock().unwrap().entry(name.clone()).or_default() += 1;
            let outcome = self
                .script
                .outcomes
                .lock()
                .unwrap()
                .get_mut(&name)
                .and_then(|q| q.pop_front());
            Ok(outcome.unwrap_or_else(|| QueryOutcome::Transient("unscripted".into())))
        }
    }

    fn task(first: &str, last: &str) -> Task {
        Task {
            first_name: first.into(),
            last_name: last.into(),
            city: String::new(),
            state: String::new(),
            source_line: 1,
        }
    }

    fn person_html(name: &str, address: &str) -> String {
        format!(
            "<div class=\"person\"><h2><a href=\"#\">{}</a></h2>\
             <h3>Last Known Address</h3><p>{}</p></div>",
            name, address
        )
    }

    fn opts() -> RunnerOpts {
        RunnerOpts {
            max_retries: 3,
            pace_secs: 0..=0,
            limit: None,
        }
    }

    async fn run(
        tasks: &[Task],
        script: &Script,
        paths: &Paths,
        opts: &RunnerOpts,
    ) -> RunSummary {
        let s = script.clone();
        run_batch(tasks, move || Ok(s.executor()), paths, opts)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn completed_task_is_not_requeried_while_transient_retries() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::under(dir.path());
        let tasks = vec![task("John", "Doe"), task("Jane", "Roe")];

        let script = Script::default();
        script.push(
            "John Doe",
            QueryOutcome::Content(person_html("John Doe", "1 Main St, Dover, DE 19901")),
        );
        // Jane never succeeds; unscripted calls come back Transient.

        let summary = run(&tasks, &script, &paths, &opts()).await;

        assert_eq!(script.calls_for("John Doe"), 1);
        assert_eq!(script.calls_for("Jane Roe"), 3);
        assert!(summary.report.completed.contains("John Doe"));
        assert!(summary.report.pending.contains("Jane Roe"));
        assert!(paths.results_dir.join("zaba_results_John_Doe.txt").exists());
    }

    #[tokio::test]
    async fn not_found_blacklists_in_the_same_pass() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::under(dir.path());
        let tasks = vec![task("Gone", "Person")];

        let script = Script::default();
        script.push("Gone Person", QueryOutcome::NotFound);

        let summary = run(&tasks, &script, &paths, &opts()).await;

        assert_eq!(script.calls_for("Gone Person"), 1);
        assert!(summary.report.blacklisted.contains("Gone Person"));
        let blacklist = Blacklist::new(paths.blacklist_file.clone());
        assert!(blacklist.contains("gone person"));
    }

    #[tokio::test]
    async fn junk_extracted_content_is_discarded_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::under(dir.path());
        let tasks = vec![task("Junk", "Hit")];

        let script = Script::default();
        // The page parses into a record whose text trips the banner check.
        script.push(
            "Junk Hit",
            QueryOutcome::Content(person_html("Junk Hit", "No matches found")),
        );

        let summary = run(&tasks, &script, &paths, &opts()).await;

        assert!(!paths.results_dir.join("zaba_results_Junk_Hit.txt").exists());
        assert!(summary.report.failed.contains("Junk Hit"));
    }

    #[tokio::test]
    async fn exact_junk_size_result_is_removed_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::under(dir.path());
        let tasks = vec![task("Exact", "Size")];

        // Pad the address so the serialized record is exactly the junk size.
        let head = "Name: Exact Size\nLast Known Address: ";
        let address = "A".repeat(JUNK_FILE_SIZE as usize - head.len());
        let html = person_html("Exact Size", &address);
        assert_eq!(extract::extract(&html).len() as u64, JUNK_FILE_SIZE);

        let script = Script::default();
        script.push("Exact Size", QueryOutcome::Content(html));

        let summary = run(&tasks, &script, &paths, &RunnerOpts { max_retries: 1, ..opts() }).await;

        assert!(!paths.results_dir.join("zaba_results_Exact_Size.txt").exists());
        assert!(summary.report.failed.contains("Exact Size"));
    }

    #[tokio::test]
    async fn overrepresented_duplicate_name_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::under(dir.path());
        // Four occurrences of one name with max_retries = 3.
        let tasks = vec![
            task("Dup", "Name"),
            task("Dup", "Name"),
            task("Dup", "Name"),
            task("Dup", "Name"),
        ];

        let script = Script::default();
        let summary = run(&tasks, &script, &paths, &opts()).await;

        assert_eq!(script.calls_for("Dup Name"), 0);
        assert_eq!(summary.passes, 0);
        assert!(summary.report.pending.contains("Dup Name"));
    }

    #[tokio::test]
    async fn progress_survives_a_restart_via_logs_alone() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::under(dir.path());
        let tasks = vec![task("John", "Doe"), task("Jane", "Roe")];

        let first = Script::default();
        first.push(
            "John Doe",
            QueryOutcome::Content(person_html("John Doe", "1 Main St, Dover, DE 19901")),
        );
        let single_pass = RunnerOpts { max_retries: 1, ..opts() };
        run(&tasks, &first, &paths, &single_pass).await;

        // Delete the status report: logs alone must carry the progress.
        std::fs::remove_file(&paths.status_file).unwrap();

        let second = Script::default();
        second.push(
            "Jane Roe",
            QueryOutcome::Content(person_html("Jane Roe", "2 Oak Ave, Dover, DE 19901")),
        );
        let summary = run(&tasks, &second, &paths, &single_pass).await;

        assert_eq!(second.calls_for("John Doe"), 0);
        assert!(summary.report.completed.contains("John Doe"));
        assert!(summary.report.completed.contains("Jane Roe"));
        assert!(summary.report.pending.is_empty());
    }

    #[tokio::test]
    async fn per_task_errors_do_not_abort_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::under(dir.path());
        let tasks = vec![task("Bad", "Apple"), task("Good", "Egg")];

        let script = Script::default();
        script.push("Good Egg", QueryOutcome::Content(person_html("Good Egg", "3 Elm St, Dover, DE 19901")));

        // First factory call fails outright; the pass must continue.
        let s = script.clone();
        let mut first_call = true;
        let summary = run_batch(
            &tasks,
            move || {
                if std::mem::take(&mut first_call) {
                    anyhow::bail!("session setup failed");
                }
                Ok(s.executor())
            },
            &paths,
            &RunnerOpts { max_retries: 1, ..opts() },
        )
        .await
        .unwrap();

        assert!(summary.report.completed.contains("Good Egg"));
        assert!(!summary.report.errors.is_empty());
        assert!(summary.report.pending.contains("Bad Apple"));
    }
}
