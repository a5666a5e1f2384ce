//! PiiGuard CLI
//!
//! Command-line interface for managing guard configuration and masking text

mod config;

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use config::AppConfig;
use piiguard_config_file::{seed_defaults, FileConfigStore};
use piiguard_core::{
    GuardConfigStore, RowId,
    entity::list_supported_entities,
    guard::{NewFieldDefinition, NewRegexPattern},
    llm::{LlmClient, LlmReply},
};
use piiguard_pii::{
    DetectionOrchestrator, EntityDetector, GuardService, NameListDetector, TokenManager,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "piiguard")]
#[command(about = "PiiGuard - PII masking in front of LLM calls", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, value_name = "FILE", env = "PIIGUARD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Configuration store file; an in-memory seeded store is used when unset
    #[arg(long, value_name = "FILE", global = true)]
    store: Option<String>,

    /// Secret mixed into token digests
    #[arg(long, value_name = "KEY", global = true)]
    secret_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the default guard types, fields and patterns
    Seed,
    /// List active guard types
    Guards,
    /// List the active fields of a guard type
    Fields { guard: String },
    /// List active regex patterns
    Patterns,
    /// List the canonical entity vocabulary
    Entities {
        /// Include accepted synonyms
        #[arg(long)]
        synonyms: bool,
    },
    /// Mask a text and print the masked document as JSON
    Mask { guard: String, text: String },
    /// Restore a masked text from a token map file
    Unmask {
        /// JSON token map written by `mask`
        #[arg(long, value_name = "FILE")]
        map: PathBuf,
        text: String,
    },
    /// Mask, send to an offline echo model, and unmask the reply
    Process { guard: String, text: String },
    /// Add a regex pattern
    AddPattern {
        name: String,
        display_name: String,
        pattern: String,

        /// Regex flags (subset of i, m, s)
        #[arg(long, default_value = "i")]
        flags: String,

        /// Sample value the pattern should match (repeatable)
        #[arg(long = "example")]
        examples: Vec<String>,
    },
    /// Add a field to a guard type
    AddField {
        guard: String,
        field_name: String,
        display_name: String,

        #[arg(long, value_enum, default_value = "regex")]
        mode: Mode,

        /// Regex pattern name (regex and hybrid modes)
        #[arg(long)]
        pattern: Option<String>,

        /// Entity label (ner and hybrid modes)
        #[arg(long)]
        entity: Option<String>,

        #[arg(long)]
        example: Option<String>,
    },
    /// Deactivate a guard type and its fields
    DeactivateGuard { name: String },
    /// Deactivate a field by id
    DeactivateField { id: RowId },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Regex,
    Ner,
    Hybrid,
}

/// Offline model that answers with the masked text it received
struct EchoLlm;

#[async_trait]
impl LlmClient for EchoLlm {
    async fn complete(&self, masked_prompt: &str) -> piiguard_core::Result<LlmReply> {
        let body = masked_prompt
            .split_once("\n\n")
            .map(|(_, body)| body)
            .unwrap_or(masked_prompt);
        Ok(LlmReply {
            content: format!("Echo: {}", body),
            prompt_tokens: word_count(masked_prompt),
            completion_tokens: word_count(body) + 1,
            model: self.model().map(str::to_string),
        })
    }

    fn model(&self) -> Option<&str> {
        Some("echo")
    }
}

fn word_count(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = if let Some(path) = &cli.config {
        let path = shellexpand::tilde(&path.to_string_lossy()).to_string();
        AppConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?
    } else {
        AppConfig::default()
    };

    // Merge environment variables (they override config file)
    config.merge_env();

    // CLI flags have the highest precedence
    if let Some(store) = &cli.store {
        config.store_path = Some(store.clone());
    }
    if let Some(secret) = &cli.secret_key {
        config.secret_key = Some(secret.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    Ok(config)
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => level.to_lowercase(),
        other => {
            eprintln!("Warning: Invalid log level '{}', using info", other);
            "info".to_string()
        }
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn GuardConfigStore>> {
    let store = match &config.store_path {
        Some(path) => {
            let path = shellexpand::tilde(path).to_string();
            info!("📁 Using configuration store {}", path);
            FileConfigStore::open(path).await?
        }
        None => {
            let store = FileConfigStore::in_memory();
            let report = seed_defaults(&store).await?;
            info!(
                "📁 Using in-memory store seeded with {} guard types",
                report.guards_created.len()
            );
            store
        }
    };
    Ok(Arc::new(store))
}

async fn build_service(
    config: &AppConfig,
    store: Arc<dyn GuardConfigStore>,
) -> anyhow::Result<GuardService> {
    if config.uses_dev_secret() {
        warn!("⚠️  No secret key configured; tokens use the development secret");
    }

    let names: Arc<dyn EntityDetector> = Arc::new(NameListDetector::with_default_names()?);
    let orchestrator = DetectionOrchestrator::new(config.detection.clone()).with_detector(names);
    let tokens = TokenManager::new(config.secret_key(), &config.tokens);

    Ok(GuardService::new(store, orchestrator, config.merge.clone(), tokens).await?)
}

fn field_input(
    field_name: String,
    display_name: String,
    mode: Mode,
    pattern: Option<String>,
    entity: Option<String>,
) -> anyhow::Result<NewFieldDefinition> {
    let input = match (mode, pattern, entity) {
        (Mode::Regex, Some(pattern), _) => {
            NewFieldDefinition::regex(field_name, display_name, pattern)
        }
        (Mode::Ner, _, Some(entity)) => NewFieldDefinition::ner(field_name, display_name, entity),
        (Mode::Hybrid, Some(pattern), Some(entity)) => {
            NewFieldDefinition::hybrid(field_name, display_name, pattern, entity)
        }
        (Mode::Regex, None, _) => bail!("--pattern is required in regex mode"),
        (Mode::Ner, _, None) => bail!("--entity is required in ner mode"),
        (Mode::Hybrid, _, _) => bail!("--pattern and --entity are required in hybrid mode"),
    };
    Ok(input)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.logging.level)?;

    if let Commands::Entities { synonyms } = cli.command {
        return print_json(&list_supported_entities(synonyms));
    }

    if let Commands::Unmask { map, text } = &cli.command {
        let contents = std::fs::read_to_string(map)
            .with_context(|| format!("Failed to read token map {}", map.display()))?;
        let token_map: BTreeMap<String, String> = serde_json::from_str(&contents)?;
        println!("{}", piiguard_pii::tokenizer::unmask(text, &token_map));
        return Ok(());
    }

    let store = open_store(&config).await?;

    match cli.command {
        Commands::Seed => {
            let report = seed_defaults(store.as_ref()).await?;
            if report.is_empty() {
                info!("Defaults already installed");
            }
            print_json(&report)?;
        }
        Commands::Guards => print_json(&store.list_guard_types().await?)?,
        Commands::Fields { guard } => print_json(&store.list_active_fields_for(&guard).await?)?,
        Commands::Patterns => print_json(&store.list_regex_patterns().await?)?,
        Commands::Mask { guard, text } => {
            let service = build_service(&config, store).await?;
            print_json(&service.mask(&text, &guard).await?)?;
        }
        Commands::Process { guard, text } => {
            let service = build_service(&config, store).await?;
            print_json(&service.process(&text, &guard, &EchoLlm).await?)?;
        }
        Commands::AddPattern {
            name,
            display_name,
            pattern,
            flags,
            examples,
        } => {
            let input = NewRegexPattern::new(name, display_name, pattern)
                .with_flags(flags)
                .with_examples(examples);
            let id = store.create_regex_pattern(input).await?;
            println!("{}", id);
        }
        Commands::AddField {
            guard,
            field_name,
            display_name,
            mode,
            pattern,
            entity,
            example,
        } => {
            let mut input = field_input(field_name, display_name, mode, pattern, entity)?;
            if let Some(example) = example {
                input = input.with_example(example);
            }
            let id = store.create_field_definition(&guard, input).await?;
            println!("{}", id);
        }
        Commands::DeactivateGuard { name } => store.deactivate_guard_type(&name).await?,
        Commands::DeactivateField { id } => store.deactivate_field_definition(id).await?,
        Commands::Entities { .. } | Commands::Unmask { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_flags_after_command() {
        let cli = Cli::try_parse_from([
            "piiguard",
            "mask",
            "InfoPerso",
            "écrire à marie@exemple.fr",
            "--secret-key",
            "k",
        ])
        .unwrap();
        assert_eq!(cli.secret_key.as_deref(), Some("k"));
        assert!(matches!(cli.command, Commands::Mask { ref guard, .. } if guard == "InfoPerso"));
    }

    #[test]
    fn test_field_input_requires_mode_arguments() {
        let field = field_input(
            "email".into(),
            "E-mail".into(),
            Mode::Hybrid,
            Some("email".into()),
            Some("EMAIL".into()),
        )
        .unwrap();
        assert_eq!(field.pattern_ref.as_deref(), Some("email"));

        assert!(field_input("name".into(), "Nom".into(), Mode::Ner, None, None).is_err());
        assert!(field_input("x".into(), "X".into(), Mode::Regex, None, Some("PERSON".into())).is_err());
    }

    #[tokio::test]
    async fn test_echo_llm_round_trip() {
        let config = AppConfig::default();
        let store = open_store(&config).await.unwrap();
        let service = build_service(&config, store).await.unwrap();

        let text = "écrire à marie@exemple.fr";
        let outcome = service.process(text, "InfoPerso", &EchoLlm).await.unwrap();
        assert_eq!(outcome.unmasked, format!("Echo: {}", text));
        assert_eq!(outcome.masked_token_count, 1);
        assert_eq!(outcome.model.as_deref(), Some("echo"));
    }
}
