//! Check command implementation.
//!
//! Validates the configuration and queries the hardware monitor once.

use crate::classifier::SensorClassifier;
use crate::config::{validate_effective_config, Config};
use crate::source::{ConfiguredSource, SensorSource};
use crate::startup_checks::check_source;

/// Validates configuration and source reachability.
///
/// Fails when any check fails, so the process exits non-zero.
pub async fn command_check(skip_source: bool, config: &Config) -> anyhow::Result<()> {
    println!("🔍 OHM Exporter - System Check");
    println!("==============================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(()) => {
            println!("   ✅ Configuration is valid");
            println!(
                "   ├─ Listen:        {}:{}{}",
                config.bind_addr(),
                config.port(),
                config.metrics_path()
            );
            println!("   ├─ Poll interval: {}s", config.poll_interval().as_secs());
            println!("   └─ Timeout:       {}s", config.source_timeout().as_secs());
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    if !skip_source && all_ok {
        let source = ConfiguredSource::from_config(config)?;
        println!("\n🌡️  Querying hardware monitor at {}...", source.location());

        let classifier = SensorClassifier::with_constant_labels(&config.constant_labels);
        match check_source(&source, &classifier).await {
            Ok(report) => {
                println!("   ✅ Received {} sensor readings", report.readings);
                if !report.hardware.is_empty() {
                    println!("   ├─ Hardware: {}", report.hardware.join(", "));
                }
                for (metric, count) in &report.metrics {
                    println!("   ├─ {:40} {:>4} series", metric, count);
                }
                if report.unknown_types.is_empty() {
                    println!("   └─ All sensor types have a unit mapping");
                } else {
                    println!(
                        "   └─ ⚠️  Unmapped sensor types (exported as *_unknown): {}",
                        report.unknown_types.join(", ")
                    );
                }
                if report.readings == 0 {
                    println!("   ⚠️  No sensors reported - is the monitor running elevated?");
                }
            }
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review the output above");
        anyhow::bail!("system check failed")
    }
}
