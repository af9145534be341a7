use anyhow::{Context, Result, bail};
use extract::{Capabilities, NerClient, OllamaClient, Pipeline};
use tokio::io::BufReader;
use tracing::{info, warn};

use worker::{JobProcessor, JsonLinesQueue, WorkerConfig, logging};

const USAGE: &str = "usage: worker [analyze <scene-file>]";

#[tokio::main]
async fn main() -> Result<()> {
    let config = WorkerConfig::from_env()?;
    logging::init(&config.log)?;

    let capabilities = Capabilities::new(
        NerClient::new(config.ner.url.clone(), config.ner.model.clone()),
        OllamaClient::new(config.model.ollama_url.clone(), config.model.name.clone()),
    );
    let pipeline = Pipeline::new(&capabilities, config.pipeline_config());

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => serve(config, pipeline).await,
        [command, path] if command == "analyze" => analyze(&pipeline, path).await,
        _ => bail!(USAGE),
    }
}

/// Runs one scene file through the pipeline and prints the result.
async fn analyze(pipeline: &Pipeline, path: &str) -> Result<()> {
    let scene = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;

    let result = pipeline.process_scene(&scene).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Consumes work items from stdin and publishes outcomes to stdout until EOF or Ctrl-C.
async fn serve(config: WorkerConfig, pipeline: Pipeline) -> Result<()> {
    if config.queue.prefetch_count != 1 {
        warn!(
            prefetch_count = config.queue.prefetch_count,
            "Only a prefetch count of 1 is supported; handling one delivery at a time"
        );
    }

    info!(
        ingress = %config.queue.ingress,
        egress = %config.queue.egress,
        model = %config.model.name,
        ner_model = %config.ner.model,
        max_concurrent_llm_calls = config.concurrency.max_concurrent_llm_calls,
        "Worker started"
    );

    let queue = JsonLinesQueue::new(
        config.queue.ingress.clone(),
        config.queue.egress.clone(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    );
    let processor = JobProcessor::new(pipeline, queue);

    tokio::select! {
        handled = processor.run() => {
            let handled = handled?;
            info!(handled, "Input exhausted");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    let snapshot = processor.metrics().snapshot();
    info!(
        received = snapshot.received,
        completed = snapshot.completed,
        failed = snapshot.failed,
        rejected = snapshot.rejected,
        publish_failures = snapshot.publish_failures,
        avg_processing_time_ms = snapshot.avg_processing_time_ms,
        "Worker stopped"
    );
    Ok(())
}
