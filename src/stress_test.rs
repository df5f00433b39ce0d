use async_stream::stream;
use chrono::Utc;
use futures::stream::Stream;
use futures::stream::StreamExt;
use mdib_core::{Descriptor, Kind, MetricValue};
use mdib_store::MdibSnapshot;
use mdib_transaction::{Mdib, TransactionError, TransactionKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// Statistics collected during stress testing
#[derive(Clone, Debug)]
pub struct StressTestStats {
    pub num_writers: usize,
    pub transactions_per_writer: usize,
    pub committed: usize,
    pub rejected: usize,
    pub notifications: usize,
    pub lagged: u64,
    pub final_mdib_version: u64,
    pub total_time: Duration,
    pub avg_commit_time: Duration,
    pub commits_per_second: f64,
}

impl StressTestStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Stress Test Statistics                         ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Number of Writers:         {:>38} ║", self.num_writers);
        println!("║  Transactions per Writer:   {:>38} ║", self.transactions_per_writer);
        println!("║  Committed:                 {:>38} ║", self.committed);
        println!("║  Rejected:                  {:>38} ║", self.rejected);
        println!("║  Notifications Received:    {:>38} ║", self.notifications);
        println!("║  Notifications Lagged:      {:>38} ║", self.lagged);
        println!("║  Final MDIB Version:        {:>38} ║", self.final_mdib_version);
        println!("║  Total Time:                {:>39}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("║  Average Commit Time:       {:>36}µs ║", format!("{:.2}", self.avg_commit_time.as_micros()));
        println!("║  Commits/Second:            {:>38.0} ║", self.commits_per_second);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

/// Per-writer tally, merged into [`StressTestStats`] at the end.
#[derive(Default)]
struct WriterTally {
    commit_times: Vec<Duration>,
    committed: usize,
    rejected: usize,
}

impl WriterTally {
    fn record(&mut self, started: Instant, outcome: Result<(), TransactionError>) {
        match outcome {
            Ok(()) => {
                self.commit_times.push(started.elapsed());
                self.committed += 1;
            }
            Err(err) => {
                debug!(error = %err, "transaction rejected");
                self.rejected += 1;
            }
        }
    }
}

/// One descriptor-level change picked by the churn generator.
#[derive(Debug, Clone)]
enum ChurnOp {
    Create { handle: String, channel: usize },
    Delete { handle: String },
    Touch { channel: usize },
}

fn channel_handle(channel: usize) -> String {
    format!("ch{}", channel)
}

fn metric_handle(channel: usize) -> String {
    format!("ch{}.hr", channel)
}

/// A single MDS with one VMD, `num_channels` channels with one metric each,
/// and an alert system.
fn build_device(num_channels: usize) -> Result<Mdib, TransactionError> {
    let mut descriptors = vec![
        Descriptor::mds("mds0"),
        Descriptor::child(Kind::Vmd, "vmd0", "mds0"),
        Descriptor::child(Kind::AlertSystem, "asys0", "mds0"),
    ];
    for channel in 0..num_channels {
        let ch = channel_handle(channel);
        descriptors.push(Descriptor::child(Kind::Channel, ch.as_str(), "vmd0"));
        descriptors.push(Descriptor::child(Kind::NumericMetric, metric_handle(channel), ch.as_str()));
    }
    let mdib = Mdib::default();
    mdib.load(descriptors, Vec::new())?;
    Ok(mdib)
}

/// Generator that yields random descriptor changes against `num_channels` channels
fn churn_generator(writer: usize, num_channels: usize, num_ops: usize) -> impl Stream<Item = ChurnOp> {
    stream! {
        let mut rng = StdRng::from_entropy();
        for i in 0..num_ops {
            let channel = rng.gen_range(0..num_channels);
            let op = match rng.gen_range(0..10) {
                0..=4 => ChurnOp::Create {
                    handle: format!("w{}.m{}", writer, i),
                    channel,
                },
                5..=7 if i > 0 => ChurnOp::Delete {
                    handle: format!("w{}.m{}", writer, rng.gen_range(0..i)),
                },
                _ => ChurnOp::Touch { channel },
            };
            yield op;
        }
    }
}

/// Drain notifications until the MDIB is dropped, checking they arrive in
/// mdib version order.
async fn collect_notifications(
    mut rx: tokio::sync::broadcast::Receiver<Arc<mdib_transaction::TransactionResult>>,
) -> (usize, u64) {
    let mut received = 0usize;
    let mut lagged = 0u64;
    let mut last_version = 0u64;
    loop {
        match rx.recv().await {
            Ok(result) => {
                let version = result.mdib_version();
                if version <= last_version {
                    println!("  ✗ Out-of-order notification: {} after {}", version, last_version);
                }
                last_version = version;
                received += 1;
            }
            Err(RecvError::Lagged(skipped)) => lagged += skipped,
            Err(RecvError::Closed) => break,
        }
    }
    (received, lagged)
}

/// Waits for the writers, drops the MDIB and assembles the statistics.
async fn finish(
    mdib: Arc<Mdib>,
    writers: Vec<tokio::task::JoinHandle<WriterTally>>,
    collector: tokio::task::JoinHandle<(usize, u64)>,
    transactions_per_writer: usize,
    start: Instant,
) -> (StressTestStats, MdibSnapshot) {
    let num_writers = writers.len();
    let mut tally = WriterTally::default();
    for handle in writers {
        if let Ok(writer) = handle.await {
            tally.commit_times.extend(writer.commit_times);
            tally.committed += writer.committed;
            tally.rejected += writer.rejected;
        }
    }

    let snapshot = mdib.snapshot();
    drop(mdib);
    let (notifications, lagged) = collector.await.unwrap_or((0, 0));
    let total_time = start.elapsed();

    let avg_commit_time = if !tally.commit_times.is_empty() {
        tally.commit_times.iter().sum::<Duration>() / tally.commit_times.len() as u32
    } else {
        Duration::ZERO
    };

    let stats = StressTestStats {
        num_writers,
        transactions_per_writer,
        committed: tally.committed,
        rejected: tally.rejected,
        notifications,
        lagged,
        final_mdib_version: snapshot.mdib_version(),
        total_time,
        avg_commit_time,
        commits_per_second: tally.committed as f64 / total_time.as_secs_f64(),
    };
    (stats, snapshot)
}

/// Stress test for concurrent metric state transactions
pub async fn stress_test_metric_updates(
    num_writers: usize,
    updates_per_writer: usize,
    num_channels: usize,
) -> Result<StressTestStats, TransactionError> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Metric Update Stress Test (Async)                   ║");
    println!("║  Writers: {} | Updates/Writer: {} | Channels: {} ║",
             num_writers, updates_per_writer, num_channels);
    println!("╚════════════════════════════════════════════════════════════╝");

    let start = Instant::now();
    let mdib = Arc::new(build_device(num_channels.max(1))?);
    let collector = tokio::spawn(collect_notifications(mdib.subscribe()));

    println!("\n[Phase 1/2] Committing metric updates...");

    let mut writers = vec![];
    for writer in 0..num_writers {
        let mdib = Arc::clone(&mdib);
        let handle = tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut tally = WriterTally::default();
            for i in 0..updates_per_writer {
                let handle = metric_handle(rng.gen_range(0..num_channels.max(1)));
                let value: f64 = rng.gen_range(40.0..180.0);
                let caller_time = (i % 10 == 0).then(Utc::now);

                let started = Instant::now();
                let outcome = mdib
                    .with_transaction(TransactionKind::metric(), |tx| {
                        tx.get_state(&handle)?.set_metric_value(MetricValue {
                            determination_time: caller_time,
                            ..MetricValue::numeric(value)
                        });
                        Ok(())
                    })
                    .map(|_| ());
                tally.record(started, outcome);

                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            debug!(writer, committed = tally.committed, "writer finished");
            tally
        });
        writers.push(handle);
    }

    let (stats, snapshot) = finish(mdib, writers, collector, updates_per_writer, start).await;
    println!("[Phase 1/2] ✓ Completed");
    println!("[Phase 2/2] Verifying store...");
    if snapshot.mdib_version() != stats.committed as u64 {
        println!("  ✗ MDIB version {} does not match {} commits",
                 snapshot.mdib_version(), stats.committed);
    }
    let state_versions: u64 = (0..num_channels.max(1))
        .filter_map(|channel| snapshot.state(&metric_handle(channel)))
        .map(|state| state.state_version())
        .sum();
    if state_versions != stats.committed as u64 {
        println!("  ✗ State versions sum to {}, expected {}", state_versions, stats.committed);
    }

    println!("[Phase 2/2] ✓ Completed");
    Ok(stats)
}

/// Stress test for concurrent descriptor creation, deletion and updates
pub async fn stress_test_descriptor_churn(
    num_writers: usize,
    ops_per_writer: usize,
) -> Result<StressTestStats, TransactionError> {
    const NUM_CHANNELS: usize = 4;

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Descriptor Churn Stress Test (Async)                ║");
    println!("║  Writers: {} | Ops/Writer: {} | Channels: {} ║",
             num_writers, ops_per_writer, NUM_CHANNELS);
    println!("╚════════════════════════════════════════════════════════════╝");

    let start = Instant::now();
    let mdib = Arc::new(build_device(NUM_CHANNELS)?);
    let collector = tokio::spawn(collect_notifications(mdib.subscribe()));

    println!("\n[Phase 1/2] Creating, deleting and updating descriptors...");

    let mut writers = vec![];
    for writer in 0..num_writers {
        let mdib = Arc::clone(&mdib);
        let handle = tokio::spawn(async move {
            let mut tally = WriterTally::default();
            let mut ops = Box::pin(churn_generator(writer, NUM_CHANNELS, ops_per_writer));
            let mut i = 0usize;
            while let Some(op) = ops.next().await {
                let started = Instant::now();
                let outcome = mdib
                    .with_transaction(TransactionKind::Descriptor, |tx| match &op {
                        ChurnOp::Create { handle, channel } => tx.add_descriptor(
                            Descriptor::child(
                                Kind::NumericMetric,
                                handle.as_str(),
                                channel_handle(*channel),
                            ),
                            true,
                            None,
                        ),
                        ChurnOp::Delete { handle } => tx.remove_descriptor(handle),
                        ChurnOp::Touch { channel } => {
                            tx.get_descriptor(&channel_handle(*channel)).map(|_| ())
                        }
                    })
                    .map(|_| ());
                tally.record(started, outcome);

                i += 1;
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            tally
        });
        writers.push(handle);
    }

    let (stats, snapshot) = finish(mdib, writers, collector, ops_per_writer, start).await;
    println!("[Phase 1/2] ✓ Completed");
    println!("[Phase 2/2] Verifying store...");
    let orphaned = snapshot
        .states
        .iter()
        .filter(|state| snapshot.descriptor(state.descriptor_handle().as_str()).is_none())
        .count();
    if orphaned > 0 {
        println!("  ✗ {} states without a descriptor", orphaned);
    }
    if snapshot.states.len() != snapshot.descriptors.len() {
        println!("  ✗ {} states for {} descriptors",
                 snapshot.states.len(), snapshot.descriptors.len());
    }

    println!("[Phase 2/2] ✓ Completed");
    Ok(stats)
}

/// Metric update throughput as the number of writers grows
pub async fn stress_test_scaling(max_writers: usize, step_size: usize) -> Result<(), TransactionError> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║     Scaling Analysis - Commit Throughput vs Writers        ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut current_writers = step_size.max(1);
    while current_writers <= max_writers {
        let stats = stress_test_metric_updates(current_writers, 100, current_writers).await?;
        stats.print();
        current_writers += step_size.max(1);
    }
    Ok(())
}
