use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use parallel_get::app::{App, RunOptions, RunOutcome};
use parallel_get::config::Config;
use parallel_get::engine::{
    CancellationController, FailurePolicy, JobDescriptor, JobMode, JobOutput, JobRunner, Pipeline,
    WorkerPool,
};
use parallel_get::error::{ParallelGetError, ParallelGetResult};
use parallel_get::target::Target;

/// Records every call and answers discovery from a fixed table
struct RecordingRunner {
    discovered: Vec<(&'static str, &'static str)>,
    calls: Mutex<Vec<(JobMode, String)>>,
}

#[async_trait]
impl JobRunner for RecordingRunner {
    async fn run(
        &self,
        job: JobDescriptor,
        mode: JobMode,
        _cancel: CancellationToken,
    ) -> ParallelGetResult<JobOutput> {
        self.calls.lock().push((mode, job.instruction.clone()));
        match mode {
            JobMode::Discovery => self
                .discovered
                .iter()
                .find(|(target, _)| *target == job.instruction)
                .map(|(_, output)| JobOutput::Text(output.to_string()))
                .ok_or(ParallelGetError::JobFailed {
                    instruction: job.instruction,
                    status: "exit status: 127".to_string(),
                }),
            JobMode::Execution => Ok(JobOutput::Completed),
        }
    }
}

#[tokio::test]
async fn discovered_links_become_execution_jobs_in_order() {
    let runner = Arc::new(RecordingRunner {
        discovered: vec![("get_current_ubuntu libfoo", "http://x/a\nhttp://x/b")],
        calls: Mutex::new(Vec::new()),
    });
    let pool = WorkerPool::new(1, FailurePolicy::FailFast, CancellationToken::new());
    let pipeline = Pipeline::new(runner.clone(), pool, "/tmp/unused");

    let report = pipeline
        .run(&[Target { line: 1, instruction: "get_current_ubuntu libfoo".to_string() }])
        .await
        .unwrap();

    assert_eq!(report.jobs, 2);
    assert_eq!(
        *runner.calls.lock(),
        vec![
            (JobMode::Discovery, "get_current_ubuntu libfoo".to_string()),
            (JobMode::Execution, "http://x/a".to_string()),
            (JobMode::Execution, "http://x/b".to_string()),
        ]
    );
}

fn install_root(library: &str, definitions: &str) -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("libc.sh"), library).unwrap();
    std::fs::write(root.path().join("get"), definitions).unwrap();
    root
}

fn config_for(root: &Path) -> Config {
    let mut config = Config::default();
    config.scripts.root = root.to_path_buf();
    config.scripts.library = "libc.sh".into();
    config.scripts.dry_run_var = "E2E_DRY_RUN".to_string();
    config
}

const LIBRARY: &str = r#"
get_all_ubuntu() {
    if [ -n "$E2E_DRY_RUN" ]; then
        echo "fetch http://x/$1/a"
        echo "fetch http://x/$1/b"
    fi
}
get_current_ubuntu() {
    if [ -n "$E2E_DRY_RUN" ]; then
        echo "fetch http://x/$1/current"
    fi
}
fetch() {
    [ -z "$E2E_DRY_RUN" ] || exit 9
    echo "$1" >> fetched.log
}
"#;

#[tokio::test]
async fn full_run_fetches_every_discovered_link() {
    let root = install_root(
        LIBRARY,
        "#!/bin/bash\n. common/libc.sh\nget_all_ubuntu zlib\nget_current_ubuntu ssl\nget_other nope\n",
    );
    let scratch_parent = tempfile::tempdir().unwrap();
    let plan_path = scratch_parent.path().join("plan.json");
    let app = App::new(config_for(root.path()), CancellationController::new());

    let outcome = app
        .run(&RunOptions {
            list_only: false,
            plan_path: Some(plan_path.clone()),
            scratch_parent: Some(scratch_parent.path().to_path_buf()),
        })
        .await
        .unwrap();

    let report = match outcome {
        RunOutcome::Completed(report) => report,
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert_eq!(report.targets, 2);
    assert_eq!(report.jobs, 3);
    assert!(report.is_success());

    let mut fetched: Vec<String> = std::fs::read_to_string(root.path().join("fetched.log"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    fetched.sort();
    assert_eq!(fetched, vec!["http://x/ssl/current", "http://x/zlib/a", "http://x/zlib/b"]);

    let plan = parallel_get::engine::Plan::load(&plan_path).unwrap();
    assert_eq!(
        plan.items,
        vec!["fetch http://x/zlib/a", "fetch http://x/zlib/b", "fetch http://x/ssl/current"]
    );

    // only the plan file is left next to the removed scratch directory
    assert_eq!(std::fs::read_dir(scratch_parent.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn failed_fetch_fails_the_run() {
    // later definition wins
    let library = format!("{}\nfetch() {{ exit 4; }}\n", LIBRARY);
    let root = install_root(&library, "get_all_ubuntu zlib\n");
    let app = App::new(config_for(root.path()), CancellationController::new());

    let err = app.run(&RunOptions::default()).await.unwrap_err();

    match err {
        ParallelGetError::JobFailed { instruction, status } => {
            assert!(instruction.starts_with("fetch http://x/zlib/"));
            assert!(status.contains('4'));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn cancellation_stops_a_running_phase() {
    let root = install_root(
        "get_all_ubuntu() { sleep 60; }\n",
        "get_all_ubuntu a\nget_all_ubuntu b\nget_all_ubuntu c\n",
    );
    let controller = CancellationController::new();
    let app = App::new(config_for(root.path()), controller.clone());

    let trigger = controller.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = app.run(&RunOptions::default()).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(30));
}
