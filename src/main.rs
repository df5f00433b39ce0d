use stress_test::{
    stress_test_descriptor_churn, stress_test_metric_updates, stress_test_scaling,
};
use mdib_transaction::TransactionError;
use tracing_subscriber::EnvFilter;
pub mod stress_test;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start runtime: {}", err);
            std::process::exit(1);
        }
    };
    if let Err(err) = rt.block_on(async_main()) {
        eprintln!("stress test failed: {}", err);
        std::process::exit(1);
    }
}

async fn async_main() -> Result<(), TransactionError> {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            MDIB TRANSACTION STRESS TESTS                   ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    // Test 1: metric updates, small scale
    let stats = stress_test_metric_updates(4, 100, 8).await?;
    stats.print();

    // Test 2: descriptor churn, small scale
    let stats = stress_test_descriptor_churn(4, 200).await?;
    stats.print();

    // Test 3: metric updates, medium scale
    let stats = stress_test_metric_updates(10, 500, 32).await?;
    stats.print();

    // Test 4: descriptor churn, medium scale
    let stats = stress_test_descriptor_churn(16, 1000).await?;
    stats.print();

    // Test 5: scaling analysis
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║          SCALING ANALYSIS (metric updates)                 ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    stress_test_scaling(20, 4).await?;

    println!("\n✓ All stress tests completed successfully!");
    Ok(())
}
