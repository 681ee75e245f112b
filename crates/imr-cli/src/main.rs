#![forbid(unsafe_code)]

//! imr - compile language-model output into Intermediate Map Representations.
//!
//! # Commands
//!
//! - `compile`: Repair model output and compile it into an IMR
//! - `repair`: Run the tolerant parser only and report the repairs applied
//! - `filters`: Synthesize the filter tree for a single entity
//! - `lookup`: Show the raw knowledge-base answer for a term or colour

mod config;

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use imr_compiler::{Compiler, synthesize};
use imr_core::{EntityDescriptor, EntityId, FilterValue, PropertyDescriptor, ResponseStatus};
use imr_parser::{parse_evidence_json, parse_tolerant_with};
use imr_tags::{StaticTagKnowledgeBase, TagKnowledgeBase};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// imr - compile language-model output into Intermediate Map Representations.
#[derive(Debug, Parser)]
#[command(
    name = "imr",
    version,
    about = "Compile language-model output into Intermediate Map Representations",
    long_about = "Repairs the semi-structured YAML a language model produces for a\n\
        location query and compiles it into filter trees for a geo-query engine."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging (can be repeated for more detail: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (defaults to ./imr.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Offline vocabulary JSON used instead of the remote knowledge base
    #[arg(long, global = true)]
    vocabulary: Option<PathBuf>,

    /// Knowledge-base term search endpoint
    #[arg(long, global = true)]
    search_endpoint: Option<String>,

    /// Knowledge-base colour endpoint
    #[arg(long, global = true)]
    color_endpoint: Option<String>,

    /// Maximum number of repairs attempted on malformed input
    #[arg(long, global = true)]
    max_repairs: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Repair model output and compile it into an IMR.
    Compile {
        /// Input file path, "-" for stdin, or inline text. If omitted, reads from stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Wrap the result in a response envelope
        #[arg(long)]
        envelope: bool,

        /// Sentence the model output was generated from (envelope only)
        #[arg(long, requires = "envelope")]
        sentence: Option<String>,

        /// Model version recorded in the envelope
        #[arg(long, requires = "envelope")]
        model_version: Option<String>,

        /// Output file path. If omitted, writes to stdout.
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Run the tolerant parser and report the repairs it applied.
    Repair {
        /// Input file path, "-" for stdin, or inline text.
        #[arg(default_value = "-")]
        input: String,

        /// Output the repaired document and every repair (default is summary)
        #[arg(long)]
        full: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Synthesize the filter tree for one entity.
    Filters {
        /// Entity name, e.g. "restaurant" or "brand:h&m"
        name: String,

        /// Property as NAME or NAME:OPERATOR:VALUE (repeatable)
        #[arg(short, long = "property", value_name = "PROPERTY")]
        properties: Vec<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Show the knowledge-base answer for a term.
    Lookup {
        term: String,

        /// Look the term up as a colour
        #[arg(long)]
        color: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(|name| std::env::var(name).ok());
    if let Some(endpoint) = &cli.search_endpoint {
        config.knowledge_base.search_endpoint = Some(endpoint.clone());
    }
    if let Some(endpoint) = &cli.color_endpoint {
        config.knowledge_base.color_endpoint = Some(endpoint.clone());
    }
    if let Some(max_repairs) = cli.max_repairs {
        config.parser.max_attempts = max_repairs;
    }

    match cli.command {
        Command::Compile {
            input,
            pretty,
            envelope,
            sentence,
            model_version,
            output,
        } => {
            let knowledge_base = build_knowledge_base(&config, cli.vocabulary.as_deref())?;
            let compiler = Compiler::new(knowledge_base)
                .with_repair_options(config.parser.repair_options());
            cmd_compile(
                &compiler,
                &input,
                pretty,
                envelope.then_some((
                    sentence.as_deref().unwrap_or_default(),
                    model_version.as_deref(),
                )),
                output.as_deref(),
            )
        }

        Command::Repair {
            input,
            full,
            pretty,
        } => cmd_repair(&config, &input, full, pretty),

        Command::Filters {
            name,
            properties,
            pretty,
        } => {
            let knowledge_base = build_knowledge_base(&config, cli.vocabulary.as_deref())?;
            cmd_filters(&knowledge_base, &name, &properties, pretty)
        }

        Command::Lookup {
            term,
            color,
            pretty,
        } => {
            let knowledge_base = build_knowledge_base(&config, cli.vocabulary.as_deref())?;
            cmd_lookup(&knowledge_base, &term, color, pretty)
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

fn build_knowledge_base(
    config: &Config,
    vocabulary: Option<&Path>,
) -> Result<Arc<dyn TagKnowledgeBase>> {
    if let Some(path) = vocabulary {
        let knowledge_base = StaticTagKnowledgeBase::from_path(path)
            .with_context(|| format!("Failed to load vocabulary: {}", path.display()))?;
        info!(
            terms = knowledge_base.term_count(),
            "using offline vocabulary"
        );
        return Ok(Arc::new(knowledge_base));
    }
    remote_knowledge_base(config)
}

#[cfg(feature = "http")]
fn remote_knowledge_base(config: &Config) -> Result<Arc<dyn TagKnowledgeBase>> {
    use imr_tags::{CachedTagKnowledgeBase, HttpTagKnowledgeBase};

    if config.knowledge_base.search_endpoint.is_none() {
        bail!(
            "No knowledge base configured: pass --vocabulary, --search-endpoint, \
             or set IMR_SEARCH_ENDPOINT"
        );
    }
    let client = HttpTagKnowledgeBase::new(config.knowledge_base.clone())
        .context("Failed to create knowledge base client")?;
    Ok(Arc::new(CachedTagKnowledgeBase::new(client)))
}

#[cfg(not(feature = "http"))]
fn remote_knowledge_base(_config: &Config) -> Result<Arc<dyn TagKnowledgeBase>> {
    bail!("This build has no HTTP support; pass --vocabulary")
}

fn load_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else if Path::new(input).exists() {
        std::fs::read_to_string(input).context(format!("Failed to read file: {input}"))
    } else {
        // Treat as inline model output
        Ok(input.to_string())
    }
}

fn write_output(output: Option<&str>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).context(format!("Failed to write to: {path}"))?;
            info!("Wrote output to: {path}");
        }
        None => {
            writeln!(io::stdout(), "{content}").context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

// =============================================================================
// Command: compile
// =============================================================================

fn cmd_compile(
    compiler: &Compiler<Arc<dyn TagKnowledgeBase>>,
    input: &str,
    pretty: bool,
    envelope: Option<(&str, Option<&str>)>,
    output: Option<&str>,
) -> Result<()> {
    let source = load_input(input)?;

    if let Some((sentence, model_version)) = envelope {
        let response = compiler.respond(sentence, &source, model_version);
        write_output(output, &to_json(&response, pretty)?)?;
        if response.status == ResponseStatus::Error {
            std::process::exit(1);
        }
        return Ok(());
    }

    let compiled = compiler
        .compile_text(&source)
        .context("Failed to compile model output")?;
    for repair in &compiled.parse.repairs {
        debug!(
            line = repair.line,
            before = repair.before.as_str(),
            after = repair.after.as_str(),
            "applied repair"
        );
    }

    let Some(compilation) = compiled.compilation else {
        let reason = compiled
            .parse
            .failure()
            .map_or_else(|| "unknown failure".to_string(), ToString::to_string);
        error!("Model output could not be repaired: {reason}");
        std::process::exit(1);
    };

    for warning in &compilation.warnings {
        warn!("{}: {}", warning.code.as_str(), warning.message);
    }
    write_output(output, &to_json(&compilation.imr, pretty)?)
}

// =============================================================================
// Command: repair
// =============================================================================

fn cmd_repair(config: &Config, input: &str, full: bool, pretty: bool) -> Result<()> {
    let source = load_input(input)?;
    let parsed = parse_tolerant_with(&source, config.parser.repair_options());

    let output = if full {
        to_json(&parsed, pretty)?
    } else if pretty {
        let value: serde_json::Value = serde_json::from_str(&parse_evidence_json(&parsed))?;
        serde_json::to_string_pretty(&value)?
    } else {
        parse_evidence_json(&parsed)
    };

    println!("{output}");

    for warning in &parsed.warnings {
        warn!("Parse warning: {}", warning.message);
    }

    Ok(())
}

// =============================================================================
// Command: filters
// =============================================================================

fn cmd_filters(
    knowledge_base: &Arc<dyn TagKnowledgeBase>,
    name: &str,
    properties: &[String],
    pretty: bool,
) -> Result<()> {
    let mut entity = EntityDescriptor::named(EntityId::Index(0), name);
    if !properties.is_empty() {
        entity.properties = Some(properties.iter().map(|raw| parse_property(raw)).collect());
    }

    let filters = synthesize(knowledge_base, &entity)
        .with_context(|| format!("Failed to synthesize filters for '{name}'"))?;
    if filters.is_none() {
        warn!("'{name}' has no knowledge base mapping");
    }
    println!("{}", to_json(&filters, pretty)?);
    Ok(())
}

/// `NAME` or `NAME:OPERATOR:VALUE`. Names may themselves contain colons
/// (`building:colour`), so the operator and value are split from the right.
fn parse_property(raw: &str) -> PropertyDescriptor {
    let mut parts = raw.rsplitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(value), Some(operator), Some(name)) if !name.is_empty() => PropertyDescriptor {
            name: name.to_string(),
            operator: Some(operator.to_string()),
            value: Some(parse_value(value)),
        },
        _ => PropertyDescriptor::named(raw),
    }
}

/// Numbers stay numbers; anything else is text.
fn parse_value(raw: &str) -> FilterValue {
    serde_json::from_str::<FilterValue>(raw).unwrap_or_else(|_| FilterValue::text(raw))
}

// =============================================================================
// Command: lookup
// =============================================================================

fn cmd_lookup(
    knowledge_base: &Arc<dyn TagKnowledgeBase>,
    term: &str,
    color: bool,
    pretty: bool,
) -> Result<()> {
    let output = if color {
        let bundle = knowledge_base
            .lookup_color(term)
            .with_context(|| format!("Colour lookup for '{term}' failed"))?;
        to_json(&*bundle, pretty)?
    } else {
        let groups = knowledge_base
            .lookup_term(term)
            .with_context(|| format!("Term lookup for '{term}' failed"))?;
        if groups.is_empty() {
            warn!("'{term}' is not in the knowledge base");
        }
        to_json(&*groups, pretty)?
    };
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use imr_core::FilterValue;

    use super::{parse_property, parse_value};

    #[test]
    fn bare_property_has_no_constraint() {
        let property = parse_property("outdoor seating");
        assert_eq!(property.name, "outdoor seating");
        assert!(!property.is_constrained());
    }

    #[test]
    fn constrained_property_splits_from_the_right() {
        let property = parse_property("building:colour:=:red");
        assert_eq!(property.name, "building:colour");
        assert_eq!(property.operator.as_deref(), Some("="));
        assert_eq!(property.value, Some(FilterValue::text("red")));

        let property = parse_property("height:>:10");
        assert_eq!(property.name, "height");
        assert_eq!(property.value, Some(FilterValue::from(10)));
    }

    #[test]
    fn values_keep_numbers_and_text() {
        assert_eq!(parse_value("3.5").to_string(), "3.5");
        assert_eq!(parse_value("true"), FilterValue::text("true"));
        assert_eq!(parse_value("dark red"), FilterValue::text("dark red"));
    }
}
