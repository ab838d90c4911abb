use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use futures::future::join_all;
use serde_json::json;

use adaptive_tools::config::loader::load_config_from_file;
use adaptive_tools::config::validator::validate_config;
use adaptive_tools::{
    combine, init_logging, runners_in_executor, DistributeConfig, Executor, Learner, LearnerKind,
    LocalExecutor, Point, PointLearner,
};

const USAGE: &str = "usage: adaptive_tools run <config> | adaptive_tools combine <config> <n>";

/// Sharp peak on a slope; the offset moves the peak between learners.
fn demo_learners(n: usize) -> Vec<Learner> {
    (0..n)
        .map(|i| {
            let offset = -0.5 + i as f64 / n.max(1) as f64;
            Learner::new(
                LearnerKind::Point(PointLearner::new((-1.0, 1.0))),
                move |p: &Point| match p {
                    Point::X(x) => {
                        let a = 0.01;
                        json!(x.0 + a * a / (a * a + (x.0 - offset).powi(2)))
                    }
                    _ => json!(null),
                },
            )
            .with_fname(format!("demo_{}.ckpt", i))
        })
        .collect()
}

fn load(path: &str) -> anyhow::Result<DistributeConfig> {
    let config = load_config_from_file(Path::new(path))
        .with_context(|| format!("loading config from {}", path))?;
    if let Err(e) = init_logging(&config.log_level) {
        eprintln!("[Main] WARNING: Failed to install logger: {}", e);
    }
    validate_config(&config)?;
    Ok(config)
}

async fn run(path: &str) -> anyhow::Result<()> {
    let config = load(path)?;
    let n_learners = config.n_groups * 2;
    let executor: Arc<dyn Executor> =
        Arc::new(LocalExecutor::new(config.n_groups + num_cpus::get()));

    log::info!(
        "[Main] Running {} demo learners in {} groups",
        n_learners,
        config.n_groups
    );
    let futures = runners_in_executor(demo_learners(n_learners), executor, &config)?;

    if config.goal.is_none() {
        log::warn!("[Main] No goal configured, running until interrupted");
    }

    tokio::select! {
        results = join_all(futures) => {
            for (index, result) in results.into_iter().enumerate() {
                let learner = result.with_context(|| format!("group {}", index))?;
                println!(
                    "group {}: {} learners, {} points, loss {:.4}",
                    index,
                    learner.len(),
                    learner.npoints(),
                    learner.loss()
                );
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("[Main] Interrupted; periodic checkpoints are on disk");
        }
    }
    Ok(())
}

fn combine_saved(path: &str, n: &str) -> anyhow::Result<()> {
    let config = load(path)?;
    let n: usize = n.parse().with_context(|| format!("invalid learner count {:?}", n))?;

    let mut tasks = demo_learners(n);
    let files = combine(&config.combine_pattern, &mut tasks)?;
    for (task, file) in tasks.iter().zip(&files) {
        println!(
            "{}: {} points, loss {:.4}",
            file.display(),
            task.npoints(),
            task.loss()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match (args.get(1).map(String::as_str), args.get(2), args.get(3)) {
        (Some("run"), Some(config), None) => run(config).await,
        (Some("combine"), Some(config), Some(n)) => combine_saved(config, n),
        _ => bail!(USAGE),
    }
}
