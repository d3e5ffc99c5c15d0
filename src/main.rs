use dotenv::dotenv;
use todo_core::{init_logging, LimiterConfig, RateLimiter};
use tracing::{debug, error, info};

fn main() {
    dotenv().ok();
    init_logging();
    info!("todo_core starting up");

    let config = match LimiterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid rate limit configuration");
            std::process::exit(1);
        }
    };
    debug!(
        trust_proxy_ip_headers = config.trust_proxy_ip_headers,
        "Configuration loaded"
    );

    match RateLimiter::new(config) {
        Ok(limiter) => {
            for policy in limiter.policies().sorted() {
                debug!(
                    policy = policy.policy_key().as_str(),
                    keying = ?policy.keying_basis,
                    windows = policy.windows.len(),
                    "Policy active"
                );
            }
            info!(
                policies = limiter.policies().len(),
                "Rate limiter initialized successfully"
            );
        }
        Err(e) => {
            error!(error = %e, "Failed to build rate limiter");
            std::process::exit(1);
        }
    }
}
