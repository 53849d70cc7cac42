//! Audiogate server entry point.
//!
//! Both classifier artifacts load before the listener binds; a failure to
//! load either aborts startup.

mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use audiogate_core::{
    ClassifierPair, OnnxSpeechClassifier, OnnxUrbanClassifier, TriageServer,
};
use settings::load_settings;

fn parse_args() -> Result<Option<PathBuf>, String> {
    let mut settings_path = None;
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --settings".into());
                };
                settings_path = Some(PathBuf::from(v));
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(settings_path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings_path = match parse_args() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{e}\nusage: audiogate-server [--settings <path>]");
            std::process::exit(2);
        }
    };

    let settings = load_settings(settings_path.as_deref())?;
    let config = settings.server_config()?;

    let speech = OnnxSpeechClassifier::load(&settings.speech_model)
        .with_context(|| format!("loading speech model {}", settings.speech_model.display()))?;
    let urban = OnnxUrbanClassifier::load(&settings.urban_model)
        .with_context(|| format!("loading urban model {}", settings.urban_model.display()))?;
    let classifiers = ClassifierPair::new(Arc::new(speech), Arc::new(urban));

    let server = TriageServer::new(config, classifiers);
    let diagnostics = server.diagnostics();

    tokio::select! {
        result = server.run() => result.context("server loop failed")?,
        _ = tokio::signal::ctrl_c() => {
            let snapshot = diagnostics.snapshot();
            info!(?snapshot, "shutdown requested");
        }
    }

    Ok(())
}
