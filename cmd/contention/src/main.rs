//! Contention demo - N workers fighting over one lock
//!
//! Each worker runs a simulated execution loop: a few "instructions" per
//! step, a breaker poll after every step, and now and then a blocking
//! region run without the lock. At the end it prints how evenly the lock
//! was shared.
//!
//! # Environment Variables
//!
//! - `CONTENTION_WORKERS=4` - Number of worker threads
//! - `CONTENTION_SECONDS=2` - How long to run
//! - `CONTENTION_IO_EVERY=0` - Blocking region every N steps (0 = never)
//! - `GIL_SWITCH_INTERVAL_US=5000` - Switch interval
//! - `GIL_FORCE_SWITCHING=1` - Releaser waits for the handoff
//! - `GIL_LOG_LEVEL=trace` - Log drop requests and handoffs

use gil::{create_lock, current_worker, global, take_gil, drop_gil, GilConfig};
use gil::{env_get, kinfo};
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct WorkerReport {
    name: String,
    steps: u64,
    yields: u64,
    held_for: Duration,
}

fn spin(n: u64) -> u64 {
    let mut acc = 0u64;
    for i in 0..n {
        acc = black_box(acc.wrapping_mul(31).wrapping_add(i));
    }
    acc
}

fn worker_loop(stop: Arc<AtomicBool>, io_every: u64) -> WorkerReport {
    let gil = global();
    let me = current_worker();
    let mut report = WorkerReport {
        name: format!("{}", me),
        steps: 0,
        yields: 0,
        held_for: Duration::ZERO,
    };

    take_gil(me);
    let mut since = Instant::now();
    while !stop.load(Ordering::Relaxed) {
        spin(2_000);
        report.steps += 1;

        if gil.breaker().should_break() {
            report.held_for += since.elapsed();
            if gil.yield_if_requested(me) {
                report.yields += 1;
            }
            since = Instant::now();
        }

        if io_every != 0 && report.steps % io_every == 0 {
            report.held_for += since.elapsed();
            gil.allow_threads(me, || thread::sleep(Duration::from_micros(200)));
            since = Instant::now();
        }
    }
    report.held_for += since.elapsed();
    drop_gil(Some(me));
    report
}

fn main() {
    println!("=== GIL Contention Demo ===\n");

    let workers: usize = env_get("CONTENTION_WORKERS", 4);
    let seconds: u64 = env_get("CONTENTION_SECONDS", 2);
    let io_every: u64 = env_get("CONTENTION_IO_EVERY", 0);

    let config = GilConfig::from_env();
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(2);
    }
    config.print();
    println!();

    if let Err(e) = gil::init(config, Arc::new(gil::AbortHooks)) {
        eprintln!("{}", e);
        std::process::exit(2);
    }
    create_lock();

    let stop = Arc::new(AtomicBool::new(false));
    let start = Instant::now();
    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let stop = stop.clone();
            thread::Builder::new()
                .name(format!("worker-{}", i))
                .spawn(move || worker_loop(stop, io_every))
                .expect("spawn worker")
        })
        .collect();

    thread::sleep(Duration::from_secs(seconds));
    stop.store(true, Ordering::Relaxed);

    let reports: Vec<WorkerReport> = handles
        .into_iter()
        .map(|h| h.join().expect("worker panicked"))
        .collect();
    let elapsed = start.elapsed();
    kinfo!("{} workers finished in {:?}", workers, elapsed);

    let stats = global().stats();
    let total_steps: u64 = reports.iter().map(|r| r.steps).sum();

    println!("\n=== Results ===");
    println!("{:<10} {:>12} {:>8} {:>10} {:>8}", "worker", "steps", "yields", "held", "share");
    for r in &reports {
        let share = if total_steps == 0 {
            0.0
        } else {
            r.steps as f64 * 100.0 / total_steps as f64
        };
        println!(
            "{:<10} {:>12} {:>8} {:>10.1?} {:>7.1}%",
            r.name, r.steps, r.yields, r.held_for, share
        );
    }
    println!();
    println!("Switches:            {}", stats.switch_count);
    println!("Drop requests:       {}", stats.drop_requests);
    println!("Forced-switch waits: {}", stats.forced_switch_waits);
    println!("Wait timeouts:       {}", stats.timeouts);
    println!("Switches/sec:        {:.0}", stats.switch_count as f64 / elapsed.as_secs_f64());

    println!("\n=== Demo Complete ===");
}
