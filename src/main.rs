//! UBA Sentinel CLI: train a bundle from normal-only payloads, score one payload,
//! evaluate against labeled sessions, or report readiness. Config path comes from `UBA_SENTINEL_CONFIG` (default `config.json`).
//!
//! ```text
//! uba-sentinel train <normal_payloads.jsonl>
//! uba-sentinel score <payload.json | ->
//! uba-sentinel evaluate <normal.jsonl> <malicious.jsonl>
//! uba-sentinel health
//! ```

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uba_sentinel::{
    config::DetectorConfig,
    features::{feature_matrix, EventLogPayload},
    logging::StructuredLogger,
    scoring::{evaluate, AnomalyScorer, Detector},
    storage::ModelBundle,
    training::Trainer,
    SentinelError,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn usage() -> BoxError {
    "usage: uba-sentinel <train <payloads.jsonl> | score <payload.json|-> | \
     evaluate <normal.jsonl> <malicious.jsonl> | health>"
        .into()
}

fn read_payloads(path: &Path) -> Result<Vec<EventLogPayload>, BoxError> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut out = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let payload = EventLogPayload::from_json_str(&line)
            .map_err(|e| format!("{}:{}: {}", path.display(), line_no + 1, e))?;
        out.push(payload);
    }
    Ok(out)
}

fn train(config: &DetectorConfig, input: &Path) -> Result<(), BoxError> {
    let payloads = read_payloads(input)?;
    info!(count = payloads.len(), path = %input.display(), "loaded normal payloads");

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
        warn!(error = %e, "could not install Ctrl+C handler");
    }

    let trained = Trainer::new(config)
        .with_stop_flag(stop)
        .train_payloads(&payloads)?;
    trained.bundle.save(&config.model_path)?;
    let report = &trained.report;
    info!(
        epochs_run = report.epochs_run,
        best_loss = ?report.best_loss,
        threshold = report.threshold,
        stop_reason = ?report.stop_reason,
        "training complete"
    );
    StructuredLogger::emit_json(report, &mut std::io::stdout())?;
    Ok(())
}

/// Bundle load failures leave the detector unloaded so the fail policy decides the output.
fn open_detector(config: &DetectorConfig) -> Detector {
    match Detector::load(&config.model_path, config.scoring.clone()) {
        Ok(d) => d,
        Err(e) => {
            warn!(path = %config.model_path.display(), error = %e, "model bundle unavailable");
            Detector::unloaded(config.scoring.clone())
        }
    }
}

fn score(config: &DetectorConfig, source: &str) -> Result<(), BoxError> {
    let mut text = String::new();
    if source == "-" {
        std::io::stdin().read_to_string(&mut text)?;
    } else {
        text = std::fs::read_to_string(source)?;
    }
    let detector = open_detector(config);
    let result = match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => detector.score(&value),
        Err(e) => {
            warn!(error = %e, "payload is not JSON");
            detector.fail(SentinelError::MalformedInput(e.to_string()))
        }
    };
    StructuredLogger::emit_json(&result, &mut std::io::stdout())?;
    Ok(())
}

/// Unlike `score`, evaluation needs a real bundle and fails without one.
fn evaluate_labeled(config: &DetectorConfig, normal: &Path, malicious: &Path) -> Result<(), BoxError> {
    let scorer = AnomalyScorer::new(ModelBundle::load(&config.model_path)?, &config.scoring)?;
    let normal = feature_matrix(&read_payloads(normal)?)?;
    let malicious = feature_matrix(&read_payloads(malicious)?)?;
    let report = evaluate(&scorer, &normal, &malicious)?;
    StructuredLogger::emit_json(&report, &mut std::io::stdout())?;
    Ok(())
}

fn main() -> Result<(), BoxError> {
    let config_path = std::env::var("UBA_SENTINEL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = DetectorConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["train", input] => train(&config, Path::new(input)),
        ["score", source] => score(&config, source),
        ["evaluate", normal, malicious] => {
            evaluate_labeled(&config, Path::new(normal), Path::new(malicious))
        }
        ["health"] => {
            let detector = open_detector(&config);
            StructuredLogger::emit_json(&detector.health(), &mut std::io::stdout())?;
            Ok(())
        }
        _ => Err(usage()),
    }
}
