// src/bin/todo_core_bench.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use structopt::StructOpt;
use tokio::sync::{Barrier, Semaphore};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use todo_core::config::{LimiterConfig, MemoryStoreConfig};
use todo_core::identity::{Principal, RequestMeta};
use todo_core::limiter::{Decision, RateLimiter};
use todo_core::reorder::{OrderedEntity, OrderedListReorder};
use todo_core::storage::MemoryOrderStore;

// Routes the limiter benchmark spreads its traffic over
const ROUTES: &[(&str, &str)] = &[
    ("GET", "/api/v1/todos"),
    ("GET", "/api/v1/todo/{key}"),
    ("POST", "/api/v1/todos"),
    ("GET", "/api/v1/priorities"),
    ("PATCH", "/api/v1/priority/{key}/reorder"),
    ("GET", "/health"),
];

#[derive(Debug, Clone, StructOpt)]
#[structopt(
    name = "todo_core_bench",
    about = "A benchmarking tool for the rate limiter and list reordering"
)]
struct Opt {
    /// What to benchmark
    #[structopt(short, long, possible_values = &["limiter", "reorder", "all"], default_value = "all")]
    target: String,

    /// Number of concurrent users to simulate
    #[structopt(short = "u", long, default_value = "10")]
    num_users: usize,

    /// Number of operations per user
    #[structopt(short = "r", long, default_value = "100")]
    requests_per_user: usize,

    /// Length of each user's list in the reorder benchmark
    #[structopt(short, long, default_value = "20")]
    list_len: i64,

    /// Number of iterations to run
    #[structopt(short, long, default_value = "3")]
    iterations: usize,

    /// Maximum concurrency level
    #[structopt(short = "c", long, default_value = "100")]
    concurrency: usize,

    /// Verbosity level
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Disable logs
    #[structopt(long)]
    disable_logs: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    ok: usize,
    rejected: usize,
    failed: usize,
}

impl Tally {
    fn total(&self) -> usize {
        self.ok + self.rejected + self.failed
    }

    fn merge(&mut self, other: Tally) {
        self.ok += other.ok;
        self.rejected += other.rejected;
        self.failed += other.failed;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let log_level = match (opt.disable_logs, opt.verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!(
            "todo_core_bench={},todo_core={}",
            log_level, log_level
        )))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if opt.num_users == 0 || opt.iterations == 0 {
        return Err("num_users and iterations must be positive".into());
    }

    if opt.target == "limiter" || opt.target == "all" {
        bench_limiter(&opt).await?;
    }
    if opt.target == "reorder" || opt.target == "all" {
        bench_reorder(&opt).await?;
    }

    Ok(())
}

fn progress_bar(len: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );
    Ok(bar)
}

async fn bench_limiter(opt: &Opt) -> Result<(), Box<dyn std::error::Error>> {
    let name = "Sliding Window Limiter";
    println!("\nRunning benchmark: {}", name);
    println!("======================={}", "=".repeat(name.len()));

    let limiter = Arc::new(RateLimiter::new(LimiterConfig::from_env()?)?);
    let mut total = Tally::default();
    let mut total_duration = Duration::ZERO;

    for iteration in 0..opt.iterations {
        if !opt.disable_logs {
            info!("Starting iteration {} of {}", iteration + 1, opt.iterations);
        }
        limiter.reset_all();

        let bar = progress_bar((opt.num_users * opt.requests_per_user) as u64)?;
        let barrier = Arc::new(Barrier::new(opt.num_users));
        let semaphore = Arc::new(Semaphore::new(opt.concurrency));
        let start_time = Instant::now();

        let handles: Vec<_> = (0..opt.num_users)
            .map(|user_id| {
                let limiter = Arc::clone(&limiter);
                let barrier = Arc::clone(&barrier);
                let semaphore = Arc::clone(&semaphore);
                let bar = bar.clone();
                let requests = opt.requests_per_user;

                tokio::spawn(async move {
                    let principal = Principal::Authenticated(format!("user_{}", user_id));
                    let addr = format!("10.0.{}.{}", user_id / 250, user_id % 250 + 1);
                    let mut tally = Tally::default();

                    barrier.wait().await;

                    for _ in 0..requests {
                        let Ok(_permit) = semaphore.acquire().await else {
                            tally.failed += 1;
                            continue;
                        };

                        let (method, route) = ROUTES[rand::rng().random_range(0..ROUTES.len())];
                        let request = RequestMeta::new(method, route).with_remote_addr(addr.as_str());

                        match limiter.check(&request, &principal) {
                            Decision::Rejected(_) => tally.rejected += 1,
                            Decision::Allowed(_) | Decision::Unlimited => tally.ok += 1,
                        }
                        bar.inc(1);
                    }

                    tally
                })
            })
            .collect();

        let iteration_tally = collect(handles, opt.disable_logs).await;
        let elapsed = start_time.elapsed();
        bar.finish_and_clear();

        report_iteration(iteration, elapsed, &iteration_tally, "allowed", "denied");
        total.merge(iteration_tally);
        total_duration += elapsed;
    }

    report_total(name, opt.iterations, total_duration, &total, "Allowed", "Denied");
    Ok(())
}

async fn bench_reorder(opt: &Opt) -> Result<(), Box<dyn std::error::Error>> {
    let name = "Ordered List Reorder";
    println!("\nRunning benchmark: {}", name);
    println!("======================={}", "=".repeat(name.len()));

    if opt.list_len < 1 {
        return Err("list_len must be at least 1".into());
    }

    let mut total = Tally::default();
    let mut total_duration = Duration::ZERO;

    for iteration in 0..opt.iterations {
        if !opt.disable_logs {
            info!("Starting iteration {} of {}", iteration + 1, opt.iterations);
        }

        // Fresh store per iteration, one list per user
        let store = MemoryOrderStore::new(MemoryStoreConfig::default());
        for user_id in 0..opt.num_users {
            let owner = format!("user_{}", user_id);
            for order in 1..=opt.list_len {
                store.insert(&owner, &format!("item_{}", order), order).await?;
            }
        }
        let reorder = Arc::new(OrderedListReorder::new(store, OrderedEntity::Priority));

        let bar = progress_bar((opt.num_users * opt.requests_per_user) as u64)?;
        let barrier = Arc::new(Barrier::new(opt.num_users));
        let semaphore = Arc::new(Semaphore::new(opt.concurrency));
        let start_time = Instant::now();

        let handles: Vec<_> = (0..opt.num_users)
            .map(|user_id| {
                let reorder = Arc::clone(&reorder);
                let barrier = Arc::clone(&barrier);
                let semaphore = Arc::clone(&semaphore);
                let bar = bar.clone();
                let requests = opt.requests_per_user;
                let list_len = opt.list_len;
                // Some users share an owner to exercise lock contention
                let owner = format!("user_{}", user_id / 2 * 2);

                tokio::spawn(async move {
                    let mut tally = Tally::default();

                    barrier.wait().await;

                    for _ in 0..requests {
                        let Ok(_permit) = semaphore.acquire().await else {
                            tally.failed += 1;
                            continue;
                        };

                        // Occasionally aim past the end to hit validation
                        let (from, to) = {
                            let mut rng = rand::rng();
                            (
                                rng.random_range(1..=list_len),
                                rng.random_range(1..=list_len + 1),
                            )
                        };

                        match reorder.apply(&owner, from, to).await {
                            Ok(_) => tally.ok += 1,
                            Err(e) if e.status_code() < 500 => tally.rejected += 1,
                            Err(_) => tally.failed += 1,
                        }
                        bar.inc(1);
                    }

                    tally
                })
            })
            .collect();

        let iteration_tally = collect(handles, opt.disable_logs).await;
        let elapsed = start_time.elapsed();
        bar.finish_and_clear();

        report_iteration(iteration, elapsed, &iteration_tally, "applied", "invalid");
        total.merge(iteration_tally);
        total_duration += elapsed;
    }

    report_total(name, opt.iterations, total_duration, &total, "Applied", "Invalid");
    Ok(())
}

async fn collect(handles: Vec<tokio::task::JoinHandle<Tally>>, disable_logs: bool) -> Tally {
    let mut tally = Tally::default();

    for result in futures::future::join_all(handles).await {
        match result {
            Ok(t) => tally.merge(t),
            Err(e) => {
                if !disable_logs {
                    warn!("Benchmark task failed: {}", e);
                }
            }
        }
    }

    tally
}

fn report_iteration(iteration: usize, elapsed: Duration, tally: &Tally, ok: &str, rejected: &str) {
    let per_second = tally.total() as f64 / elapsed.as_secs_f64();
    println!(
        "Iteration {}: {:?}, {} {}, {} {}, {} failed, {:.2} ops/sec",
        iteration + 1,
        elapsed,
        tally.ok,
        ok,
        tally.rejected,
        rejected,
        tally.failed,
        per_second
    );
}

fn report_total(
    name: &str,
    iterations: usize,
    total_duration: Duration,
    tally: &Tally,
    ok: &str,
    rejected: &str,
) {
    let total = tally.total().max(1);
    let avg_duration = total_duration / iterations as u32;

    println!("\nBenchmark Results for {}:", name);
    println!("  Total Operations:   {}", tally.total());
    println!(
        "  {:<19} {} ({:.1}%)",
        format!("{}:", ok),
        tally.ok,
        100.0 * tally.ok as f64 / total as f64
    );
    println!(
        "  {:<19} {} ({:.1}%)",
        format!("{}:", rejected),
        tally.rejected,
        100.0 * tally.rejected as f64 / total as f64
    );
    println!("  Failed:             {}", tally.failed);
    println!("  Avg. Duration:      {:?}", avg_duration);
    println!(
        "  Avg. Throughput:    {:.2} ops/second",
        tally.total() as f64 / total_duration.as_secs_f64()
    );
}
