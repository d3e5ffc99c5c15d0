// src/bin/todo_core_cli.rs

#[macro_use]
extern crate prettytable;

use std::sync::Arc;
use std::time::Duration;

use prettytable::Table;
use structopt::StructOpt;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use todo_core::clock::ManualClock;
use todo_core::config::{LimiterConfig, MemoryStoreConfig};
use todo_core::identity::{Principal, RequestMeta};
use todo_core::limiter::{Decision, RateLimiter};
use todo_core::reorder::{OrderedEntity, OrderedListReorder};
use todo_core::storage::{MemoryOrderStore, OrderedItem};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "todo_core_cli",
    about = "Inspect rate limit policies and try out reordering"
)]
struct Opt {
    /// Verbosity level
    #[structopt(short, long, parse(from_occurrences), global = true)]
    verbose: usize,

    /// Disable logs
    #[structopt(long, global = true)]
    disable_logs: bool,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Print the active policy table
    Policies,

    /// Replay a request pattern against one route on a simulated clock
    Simulate {
        /// HTTP method of the simulated request
        #[structopt(short, long, default_value = "GET")]
        method: String,

        /// Route template, e.g. /api/v1/todos
        #[structopt(short, long, default_value = "/api/v1/todos")]
        route: String,

        /// Authenticated user id; anonymous when omitted
        #[structopt(short, long)]
        user: Option<String>,

        /// Client address
        #[structopt(long, default_value = "127.0.0.1")]
        ip: String,

        /// Request pattern
        #[structopt(long, possible_values = &["burst", "steady", "sine_wave"], default_value = "burst")]
        simulation: String,

        /// Number of requests to simulate
        #[structopt(short = "n", long, default_value = "20")]
        num_requests: usize,

        /// Simulated time between requests in milliseconds
        #[structopt(short = "t", long, default_value = "100")]
        request_interval_ms: u64,
    },

    /// Seed a list, move one entry and print the result
    Reorder {
        /// Names in their initial order
        #[structopt(short, long, default_value = "A,B,C", use_delimiter = true)]
        items: Vec<String>,

        /// Current position of the entry to move
        #[structopt(short, long)]
        from: i64,

        /// Target position
        #[structopt(short, long)]
        to: i64,

        /// Which kind of list to reorder
        #[structopt(long, possible_values = &["priority", "status"], default_value = "priority")]
        entity: String,
    },
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
            "todo_core_cli={},todo_core={}",
            log_level, log_level
        )))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = LimiterConfig::from_env()?;

    match opt.cmd {
        Command::Policies => print_policies(config)?,
        Command::Simulate {
            method,
            route,
            user,
            ip,
            simulation,
            num_requests,
            request_interval_ms,
        } => {
            let request = RequestMeta::new(method, route).with_remote_addr(ip);
            let principal = match user {
                Some(id) => Principal::Authenticated(id),
                None => Principal::Anonymous,
            };
            let pattern = Pattern {
                simulation,
                num_requests,
                interval: Duration::from_millis(request_interval_ms),
            };
            simulate(config, &request, &principal, &pattern)?;
        }
        Command::Reorder {
            items,
            from,
            to,
            entity,
        } => {
            let entity = match entity.as_str() {
                "status" => OrderedEntity::Status,
                _ => OrderedEntity::Priority,
            };
            reorder(&items, from, to, entity).await?;
        }
    }

    Ok(())
}

fn print_policies(config: LimiterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let limiter = RateLimiter::new(config)?;

    let mut table = Table::new();
    table.set_titles(row!["Method", "Path", "Keyed by", "Windows"]);

    for policy in limiter.policies().sorted() {
        let windows = policy
            .windows
            .iter()
            .map(|w| format!("{}/{}s", w.limit, w.window_seconds))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(row![
            policy.method,
            policy.path,
            format!("{:?}", policy.keying_basis).to_lowercase(),
            windows
        ]);
    }

    table.printstd();
    Ok(())
}

struct Pattern {
    simulation: String,
    num_requests: usize,
    interval: Duration,
}

impl Pattern {
    // Gap before request `i`
    fn gap(&self, i: usize) -> Duration {
        match self.simulation.as_str() {
            "burst" => Duration::ZERO,
            "sine_wave" => {
                // Full cycle over the run, between 0.5x and 1.5x the base interval
                let phase = (i as f64 * std::f64::consts::PI * 2.0) / (self.num_requests as f64);
                self.interval.mul_f64(1.0 + 0.5 * phase.sin())
            }
            _ => self.interval,
        }
    }
}

fn simulate(
    config: LimiterConfig,
    request: &RequestMeta,
    principal: &Principal,
    pattern: &Pattern,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = ManualClock::starting_now();
    let limiter = RateLimiter::with_clock(config, Arc::new(clock.clone()))?;

    let Some(policy) = limiter.policy_for(&request.method, &request.route) else {
        warn!(
            method = request.method.as_str(),
            route = request.route.as_str(),
            "No policy for route, every request passes"
        );
        return Ok(());
    };
    info!(
        policy = policy.policy_key().as_str(),
        identity = limiter.identity_for(policy, request, principal).as_str(),
        "Simulating {} {} requests",
        pattern.num_requests,
        pattern.simulation
    );

    let mut table = Table::new();
    table.set_titles(row!["#", "t (ms)", "Result", "Limit", "Remaining", "Reset", "Retry-After"]);

    let mut allowed_count = 0;
    let mut denied_count = 0;
    let mut elapsed = Duration::ZERO;

    for i in 0..pattern.num_requests {
        let gap = pattern.gap(i);
        clock.advance(gap);
        elapsed += gap;

        match limiter.check(request, principal) {
            Decision::Allowed(headers) => {
                allowed_count += 1;
                table.add_row(row![
                    i + 1,
                    elapsed.as_millis(),
                    "ALLOWED",
                    headers.limit,
                    headers.remaining,
                    headers.reset,
                    "-"
                ]);
            }
            Decision::Rejected(rejection) => {
                denied_count += 1;
                table.add_row(row![
                    i + 1,
                    elapsed.as_millis(),
                    "DENIED",
                    rejection.headers.limit,
                    rejection.headers.remaining,
                    rejection.headers.reset,
                    rejection.retry_after
                ]);
            }
            Decision::Unlimited => {
                allowed_count += 1;
                table.add_row(row![i + 1, elapsed.as_millis(), "UNLIMITED", "-", "-", "-", "-"]);
            }
        }
    }

    table.printstd();

    println!("\nSimulation Results:");
    println!("-------------------");
    println!("Total requests: {}", pattern.num_requests);
    println!("Allowed: {}", allowed_count);
    println!("Denied: {}", denied_count);
    println!("Simulated time: {:?}", elapsed);

    Ok(())
}

async fn reorder(
    names: &[String],
    from: i64,
    to: i64,
    entity: OrderedEntity,
) -> Result<(), Box<dyn std::error::Error>> {
    const OWNER: &str = "cli";

    let store = MemoryOrderStore::new(MemoryStoreConfig::default());
    for (i, name) in names.iter().enumerate() {
        store.insert(OWNER, name.trim(), i as i64 + 1).await?;
    }

    print_items("Before", &store.list(OWNER));

    let reorder = OrderedListReorder::new(store, entity);
    match reorder.apply(OWNER, from, to).await {
        Ok(items) => print_items("After", &items),
        Err(e) => {
            error!(error = %e, "Reorder failed");
            println!("\n{} {}: {}", e.status_code(), e.code(), e);
            print_items("Unchanged", &reorder.store().list(OWNER));
        }
    }

    Ok(())
}

fn print_items(title: &str, items: &[OrderedItem]) {
    println!("\n{}:", title);

    let mut table = Table::new();
    table.set_titles(row!["Order", "Name", "Id", "Key"]);
    for item in items {
        table.add_row(row![item.order, item.name, item.id, item.key]);
    }
    table.printstd();
}
