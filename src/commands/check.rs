//! Check command implementation.
//!
//! Validates configuration, metric definition files, directories and,
//! optionally, cluster access.

use oss_pm_exporter::descriptors::DescriptorSet;
use oss_pm_exporter::remote::ClusterCredentials;
use std::fs;
use std::path::Path;

use crate::config::{validate_effective_config, Config};

fn check_dir(label: &str, path: &Path) -> bool {
    if !path.exists() {
        println!("   ⚠️  {} {} does not exist (created on first cycle)", label, path.display());
        return true;
    }
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => {
            println!("   ✅ {} {} is writable", label, path.display());
            true
        }
        Ok(meta) if meta.is_dir() => {
            println!("   ❌ {} {} is read-only", label, path.display());
            false
        }
        Ok(_) => {
            println!("   ❌ {} {} is not a directory", label, path.display());
            false
        }
        Err(e) => {
            println!("   ❌ {} {}: {}", label, path.display(), e);
            false
        }
    }
}

/// Validates configuration and environment.
pub async fn command_check(cluster: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 OSS PM Exporter - System Check");
    println!("=================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }
    match config.oss.url.as_deref() {
        Some(url) => println!("   ✅ OSS endpoint: {}", url),
        None => println!("   ⚠️  No OSS url configured, PM collection disabled"),
    }
    println!(
        "   ℹ️  {} families, {} RAN dumps, {} Core dumps",
        config.file.family_name.len(),
        config.file.ran_name.len(),
        config.file.core_name.len()
    );

    println!("\n📊 Checking metric definitions...");
    match DescriptorSet::load(
        &config.metric_config_path(),
        &config.app_config_path(),
        config.metric_prefix(),
    ) {
        Ok(set) => {
            println!("   ✅ {} PM metrics", set.pm.len());
            println!(
                "   ✅ {} application paths ({} metrics)",
                set.apps.len(),
                set.app_metric_count()
            );
            if set.pm.is_empty() && !config.file.family_name.is_empty() {
                println!("   ⚠️  Families are fetched but no PM metric reads them");
            }
        }
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    println!("\n📁 Checking directories...");
    all_ok &= check_dir("csv_path", &config.csv_path());
    all_ok &= check_dir("api_path", &config.api_path());

    if cluster {
        println!("\n☸️  Checking cluster access...");
        let credentials = ClusterCredentials::from_path(config.cluster.kubeconfig.as_deref());
        match oss_pm_exporter::remote::exec::connect(&credentials).await {
            Ok(client) => match client.apiserver_version().await {
                Ok(info) => println!("   ✅ Connected to API server {}", info.git_version),
                Err(e) => {
                    println!("   ❌ API server unreachable: {}", e);
                    all_ok = false;
                }
            },
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - exporter is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
