//! Usage: firewall --catalog <path> --policy <path> [--text <text>]
//!
//! Reads text from `--text` or stdin, runs one Orchestrator evaluation and
//! prints the resulting Verdict as JSON. The tokenization secret key is
//! read from `WARDEN_SECRET_KEY`; it is never accepted as a CLI argument
//! so it can't end up in shell history or a process listing.

use std::fs;
use std::io::Read;
use std::process::ExitCode;

use secrecy::SecretString;
use warden_core::{Catalog, CatalogLoader, FirewallConfig, PolicyLoader};
use warden_detect::NullExtractor;
use warden_pipeline::{CancellationToken, EvaluationRequest, Firewall};

fn usage() -> ! {
    eprintln!("Usage: firewall --catalog <path> --policy <path> [--text <text>]");
    eprintln!();
    eprintln!("Reads text from --text or stdin if omitted.");
    eprintln!("Requires the WARDEN_SECRET_KEY environment variable.");
    std::process::exit(1);
}

struct Args {
    catalog_path: String,
    policy_path: String,
    text: Option<String>,
}

fn parse_args() -> Args {
    let mut catalog_path = None;
    let mut policy_path = None;
    let mut text = None;

    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--catalog" => catalog_path = args.next(),
            "--policy" => policy_path = args.next(),
            "--text" => text = args.next(),
            "-h" | "--help" => usage(),
            other => {
                eprintln!("unrecognized argument: {other}");
                usage();
            }
        }
    }

    let (Some(catalog_path), Some(policy_path)) = (catalog_path, policy_path) else {
        usage();
    };
    Args { catalog_path, policy_path, text }
}

fn read_text(args: &Args) -> String {
    match &args.text {
        Some(text) => text.clone(),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .expect("failed to read text from stdin");
            buf
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = parse_args();

    let catalog_source = fs::read_to_string(&args.catalog_path).unwrap_or_else(|e| {
        eprintln!("failed to read catalog at {}: {e}", args.catalog_path);
        std::process::exit(1);
    });
    let catalog: Catalog = CatalogLoader::load_yaml(&catalog_source).unwrap_or_else(|e| {
        eprintln!("invalid catalog: {e}");
        std::process::exit(1);
    });

    let policy_source = fs::read_to_string(&args.policy_path).unwrap_or_else(|e| {
        eprintln!("failed to read policy set at {}: {e}", args.policy_path);
        std::process::exit(1);
    });
    let policies = PolicyLoader::load_yaml(&policy_source, &catalog).unwrap_or_else(|e| {
        eprintln!("invalid policy set: {e}");
        std::process::exit(1);
    });

    let secret_key = std::env::var("WARDEN_SECRET_KEY").unwrap_or_else(|_| {
        eprintln!("WARDEN_SECRET_KEY must be set");
        std::process::exit(1);
    });

    let mut config = FirewallConfig {
        secret_key: SecretString::from(secret_key),
        default_confidence_threshold: 0.5,
        throw_on_deny: false,
        token_format: Default::default(),
        extractor_timeout_ms: 5000,
        mask_aware_tokenization: false,
        public_record_markers: Vec::new(),
    };
    config = config.apply_env_overrides();

    let firewall = match Firewall::new(catalog, policies, config) {
        Ok(firewall) => firewall,
        Err(e) => {
            eprintln!("failed to build firewall: {e}");
            return ExitCode::FAILURE;
        }
    };

    let text = read_text(&args);
    let request = EvaluationRequest::new(text);
    let verdict = match firewall.evaluate(request, &NullExtractor, &CancellationToken::new()) {
        Ok(verdict) => verdict,
        Err(e) => {
            eprintln!("content policy violation: {e}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&verdict) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize verdict: {e}"),
    }

    ExitCode::SUCCESS
}
