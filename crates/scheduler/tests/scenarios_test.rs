//! End-to-end scenarios: priority ordering on a single worker, jobs that feed
//! themselves more work, both shutdown modes and file-based configuration.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use jobsys_scheduler::*;
use parking_lot::Mutex;

fn test_config(workers: usize) -> SchedulerConfig {
    SchedulerConfig {
        worker_threads: workers,
        wait_interval_ms: 1,
        affinity_backoff_ms: 1,
        ..SchedulerConfig::default()
    }
}

fn eventually(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

fn gated(open: &Arc<AtomicBool>) -> JobDescriptor {
    let open = Arc::clone(open);
    JobDescriptor::new(move |_| {
        while !open.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(1));
        }
        true
    })
}

// ── Priority ─────────────────────────────────────────────────────────

#[test]
fn highest_priority_runs_first_on_a_single_worker() {
    let scheduler = Scheduler::new(test_config(1)).unwrap();
    let open = Arc::new(AtomicBool::new(false));
    let blocker = scheduler.post(gated(&open));
    assert!(eventually(|| scheduler.stats().queued_jobs == 0));

    let order = Arc::new(Mutex::new(Vec::new()));
    let labelled = |label: &'static str, priority: Priority| {
        let order = Arc::clone(&order);
        JobDescriptor::new(move |_| {
            order.lock().push(label);
            true
        })
        .with_priority(priority)
    };
    let handles = scheduler.post_all(vec![
        labelled("normal-1", Priority::Normal),
        labelled("highest", Priority::Highest),
        labelled("normal-2", Priority::Normal),
    ]);
    open.store(true, Ordering::Release);

    assert_eq!(scheduler.wait(&blocker), JobResult::Ok);
    assert_eq!(scheduler.wait_all(&handles), JobResult::Ok);
    let order = order.lock();
    assert_eq!(order.len(), 3);
    assert_eq!(order[0], "highest");
    scheduler.shutdown(false).unwrap();
}

#[test]
fn every_priority_level_drains_in_order() {
    let scheduler = Scheduler::new(test_config(1)).unwrap();
    let open = Arc::new(AtomicBool::new(false));
    let blocker = scheduler.post(gated(&open));
    assert!(eventually(|| scheduler.stats().queued_jobs == 0));

    let order = Arc::new(Mutex::new(Vec::new()));
    let handles = scheduler.post_all(
        Priority::ALL
            .iter()
            .map(|&priority| {
                let order = Arc::clone(&order);
                JobDescriptor::new(move |_| {
                    order.lock().push(priority);
                    true
                })
                .with_priority(priority)
            })
            .collect(),
    );
    open.store(true, Ordering::Release);

    assert_eq!(scheduler.wait(&blocker), JobResult::Ok);
    assert_eq!(scheduler.wait_all(&handles), JobResult::Ok);
    assert_eq!(
        *order.lock(),
        vec![Priority::Highest, Priority::VeryHigh, Priority::High, Priority::Normal]
    );
    scheduler.shutdown(false).unwrap();
}

// ── Self-feeding jobs ────────────────────────────────────────────────

#[test]
fn job_enqueueing_twenty_followers_onto_itself() {
    let scheduler = Arc::new(Scheduler::new(test_config(4)).unwrap());
    let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..20).map(|_| AtomicUsize::new(0)).collect());
    let followers = Arc::new(Mutex::new(Vec::new()));

    let root = {
        let inner = Arc::clone(&scheduler);
        let runs = Arc::clone(&runs);
        let followers = Arc::clone(&followers);
        scheduler.post(JobDescriptor::new(move |ctx| {
            let me = ctx.current_job_handle();
            let handles = inner.enqueue_all(
                &me,
                (0..20)
                    .map(|i| {
                        let runs = Arc::clone(&runs);
                        JobDescriptor::new(move |_| {
                            runs[i].fetch_add(1, Ordering::SeqCst);
                            true
                        })
                    })
                    .collect(),
            );
            followers.lock().extend(handles);
            me.is_valid()
        }))
    };

    assert_eq!(scheduler.wait(&root), JobResult::Ok);
    let followers = std::mem::take(&mut *followers.lock());
    assert_eq!(followers.len(), 20);
    assert_eq!(scheduler.wait_all(&followers), JobResult::Ok);
    for handle in &followers {
        assert_eq!(scheduler.get_result(handle), JobResult::Ok);
    }
    assert!(runs.iter().all(|r| r.load(Ordering::SeqCst) == 1));

    let stats = scheduler.stats();
    assert_eq!(stats.jobs_enqueued, 20);
    assert_eq!(stats.enqueue_fallbacks, 0);
    assert_eq!(stats.chained_inline + stats.jobs_dispersed, 20);
    drop(root);
    drop(followers);
    scheduler.shutdown(false).unwrap();
}

#[test]
fn jobs_posted_from_workers_run_too() {
    let scheduler = Arc::new(Scheduler::new(test_config(2)).unwrap());
    let counter = Arc::new(AtomicUsize::new(0));

    let spawner = {
        let inner = Arc::clone(&scheduler);
        let counter = Arc::clone(&counter);
        scheduler.post(JobDescriptor::new(move |_| {
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                inner.post(JobDescriptor::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                }));
            }
            true
        }))
    };

    assert_eq!(scheduler.wait(&spawner), JobResult::Ok);
    assert!(eventually(|| counter.load(Ordering::SeqCst) == 10));
    scheduler.shutdown(false).unwrap();
}

// ── Shutdown ─────────────────────────────────────────────────────────

#[test]
fn graceful_shutdown_completes_every_queued_job() {
    let scheduler = Scheduler::new(test_config(4)).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let handles = scheduler.post_all(
        (0..50)
            .map(|_| {
                let counter = Arc::clone(&counter);
                JobDescriptor::new(move |_| {
                    thread::sleep(Duration::from_millis(1));
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                })
            })
            .collect(),
    );
    scheduler.shutdown(false).unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 50);
    assert!(!scheduler.is_running());
    for handle in &handles {
        assert_eq!(scheduler.get_result(handle), JobResult::Ok);
    }
    assert_eq!(scheduler.stats().jobs_completed, 50);
}

#[test]
fn graceful_shutdown_runs_chains_of_queued_jobs() {
    let scheduler = Scheduler::new(test_config(1)).unwrap();
    let open = Arc::new(AtomicBool::new(false));
    scheduler.post(gated(&open));
    assert!(eventually(|| scheduler.stats().queued_jobs == 0));

    let counter = Arc::new(AtomicUsize::new(0));
    let count = || {
        let counter = Arc::clone(&counter);
        JobDescriptor::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })
    };
    let parent = scheduler.post(count());
    let child = scheduler.enqueue_one(&parent, count());
    scheduler.enqueue_one(&child, count());

    let opener = {
        let open = Arc::clone(&open);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            open.store(true, Ordering::Release);
        })
    };
    scheduler.shutdown(false).unwrap();
    opener.join().unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn kill_shutdown_only_finishes_jobs_in_flight() {
    let scheduler = Scheduler::new(test_config(2)).unwrap();
    let open = Arc::new(AtomicBool::new(false));
    let in_flight = scheduler.post_all(vec![gated(&open), gated(&open)]);
    assert!(eventually(|| scheduler.stats().queued_jobs == 0));

    let counter = Arc::new(AtomicUsize::new(0));
    let queued = scheduler.post_all(
        (0..10)
            .map(|_| {
                let counter = Arc::clone(&counter);
                JobDescriptor::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                })
            })
            .collect(),
    );

    let opener = {
        let open = Arc::clone(&open);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            open.store(true, Ordering::Release);
        })
    };
    scheduler.shutdown(true).unwrap();
    opener.join().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    for handle in &in_flight {
        assert_eq!(scheduler.get_result(handle), JobResult::Ok);
    }
    for handle in &queued {
        assert_eq!(scheduler.wait(handle), JobResult::None);
    }
    assert_eq!(scheduler.wait_all(&queued), JobResult::None);
}

#[test]
fn shutdown_with_no_jobs_returns_promptly() {
    let scheduler = Scheduler::new(test_config(8)).unwrap();
    let started = Instant::now();
    scheduler.shutdown(false).unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        scheduler.shutdown(false),
        Err(SchedulerError::AlreadyShutDown)
    ));
}

// ── Worker identity ──────────────────────────────────────────────────

#[test]
fn worker_identity_is_visible_inside_jobs_only() {
    let scheduler = Scheduler::new(test_config(2)).unwrap();
    let seen = Arc::new(Mutex::new(None));

    let handle = {
        let seen = Arc::clone(&seen);
        scheduler.post(JobDescriptor::new(move |ctx| {
            let info = current_worker();
            *seen.lock() = Some((is_worker_thread(), info, ctx.info().clone()));
            true
        }))
    };
    assert_eq!(scheduler.wait(&handle), JobResult::Ok);

    let (on_worker, info, ctx_info) = seen.lock().take().unwrap();
    assert!(on_worker);
    assert_eq!(info, Some(ctx_info.clone()));
    assert!(ctx_info.index < 2);
    assert!(!is_worker_thread());
    assert!(current_worker().is_none());
    scheduler.shutdown(false).unwrap();
}

// ── Configuration ────────────────────────────────────────────────────

#[test]
fn scheduler_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[scheduler]\nworker_threads = 3\nwait_interval_ms = 2\nthread_name_prefix = \"Render\""
    )
    .unwrap();

    let config = SchedulerConfig::from_file(file.path()).unwrap();
    let names = Arc::new(Mutex::new(Vec::new()));
    let scheduler = {
        let names = Arc::clone(&names);
        Scheduler::builder()
            .config(config)
            .worker_setup(move |ctx| names.lock().push(ctx.name().to_string()))
            .build()
            .unwrap()
    };
    assert_eq!(scheduler.worker_count(), 3);
    assert!(eventually(|| names.lock().len() == 3));

    let mut names = names.lock().clone();
    names.sort();
    assert_eq!(names, vec!["Render 0", "Render 1", "Render 2"]);
    scheduler.shutdown(false).unwrap();
}

#[test]
fn invalid_config_is_rejected_before_spawning() {
    let err = Scheduler::new(test_config(config::MAX_WORKER_THREADS + 1)).unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
}
