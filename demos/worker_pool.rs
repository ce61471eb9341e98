//! Submit a burst of jobs at mixed priorities and watch the pool drain it.
//!
//! Run with `RUST_LOG=debug` to see per-job scheduler events.

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use jobq::{AgingConfig, Scheduler, SchedulerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let scheduler = Scheduler::new(
        SchedulerConfig::new(4)
            .with_poll_interval(Duration::from_millis(50))
            .with_aging(AgingConfig {
                rate_per_sec: 5,
                rebuild_interval: Duration::from_millis(250),
            }),
    )?;
    scheduler.start();

    let mut ids = Vec::new();
    for n in 0..20i64 {
        let priority = (n % 5) * 10;
        let id = scheduler.submit(priority, move || {
            std::thread::sleep(Duration::from_millis(25));
            if n == 13 {
                return Err("simulated failure".into());
            }
            Ok(())
        });
        println!("submitted job {id} at priority {priority}");
        ids.push(id);
    }

    // Promote one straggler and drop another, if they have not dispatched yet.
    if scheduler.update_priority(ids[16], 99) {
        println!("job {} promoted to priority 99", ids[16]);
    }
    if scheduler.cancel(ids[18]) {
        println!("job {} cancelled while queued", ids[18]);
    }

    scheduler.shutdown(true);

    println!("\n{:<6} {:<10} {:<9} ERROR", "JOB", "STATUS", "PRIORITY");
    for id in &ids {
        if let Some(info) = scheduler.info(*id) {
            println!(
                "{:<6} {:<10} {:<9} {}",
                info.id.to_string(),
                info.status.to_string(),
                info.priority,
                info.error.as_deref().unwrap_or("-")
            );
        }
    }

    let stats = scheduler.stats();
    println!(
        "\nsubmitted={} completed={} failed={} cancelled={}",
        stats.submitted, stats.completed, stats.failed, stats.cancelled
    );

    Ok(())
}
