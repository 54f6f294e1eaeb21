//! Roaster CLI - Map partner JSON payloads onto a target schema
//!
//! # Main Commands
//!
//! ```bash
//! roaster serve                               # Start HTTP server (port 3000)
//! roaster map orders.json -m orders.spec.json # Map with the repair agent
//! roaster execute orders.json -m spec.json    # Run a mapping once
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! roaster analyze orders.json                 # Infer the payload structure
//! roaster validate records.json -m spec.json  # Check records against a target schema
//! roaster transforms                          # Show available transforms
//! roaster example-spec                        # Show example mapping specification
//! ```

use clap::{Parser, Subcommand};
use roaster::{
    analysis::AnalyzerOptions, example_spec, load_json_file, load_spec_file, map_payload,
    proposer_from_env, transforms_description, AgentOptions, ExecutionResult, Issue, Record,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "roaster")]
#[command(about = "Map schema-less partner JSON payloads onto a target schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer the structure of a JSON payload
    Analyze {
        /// Input JSON file
        input: PathBuf,

        /// Number of records inspected
        #[arg(long, default_value = "100")]
        sample_size: usize,

        /// Number of records copied into the preview
        #[arg(long, default_value = "3")]
        preview_rows: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a mapping specification once, without the agent
    Execute {
        /// Input JSON payload
        input: PathBuf,

        /// Mapping specification file
        #[arg(short, long)]
        mapping: PathBuf,

        /// Output file for records (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write issues to this file
        #[arg(long)]
        issues: Option<PathBuf>,
    },

    /// Full pipeline: execute, validate, and repair the mapping with the agent
    Map {
        /// Input JSON payload
        input: PathBuf,

        /// Mapping specification file
        #[arg(short, long)]
        mapping: PathBuf,

        /// Maximum number of passes
        #[arg(long, default_value = "3")]
        max_iterations: usize,

        /// Seconds to wait for each proposal
        #[arg(long)]
        timeout: Option<u64>,

        /// Never call the proposal service
        #[arg(long)]
        no_agent: bool,

        /// Output file for records (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save the final mapping specification to file
        #[arg(long)]
        save_mapping: Option<PathBuf>,
    },

    /// Validate JSON records against the target schema of a specification
    Validate {
        /// Input JSON file (array of records)
        input: PathBuf,

        /// Mapping specification declaring a target schema
        #[arg(short, long)]
        mapping: PathBuf,
    },

    /// Show example mapping specification
    ExampleSpec,

    /// Show available transforms
    Transforms,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            input,
            sample_size,
            preview_rows,
            output,
        } => cmd_analyze(&input, sample_size, preview_rows, output.as_deref()),

        Commands::Execute {
            input,
            mapping,
            output,
            issues,
        } => cmd_execute(&input, &mapping, output.as_deref(), issues.as_deref()),

        Commands::Map {
            input,
            mapping,
            max_iterations,
            timeout,
            no_agent,
            output,
            save_mapping,
        } => {
            let mut options = AgentOptions::from_env().with_max_iterations(max_iterations);
            if let Some(secs) = timeout {
                options = options.with_proposal_timeout(Duration::from_secs(secs));
            }
            if no_agent {
                options = options.disabled();
            }
            cmd_map(
                &input,
                &mapping,
                &options,
                output.as_deref(),
                save_mapping.as_deref(),
            )
            .await
        }

        Commands::Validate { input, mapping } => cmd_validate(&input, &mapping),

        Commands::ExampleSpec => cmd_example_spec(),

        Commands::Transforms => cmd_transforms(),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_analyze(
    input: &Path,
    sample_size: usize,
    preview_rows: usize,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔍 Analyzing: {}", input.display());

    let payload = load_json_file(input)?;
    let options = AnalyzerOptions {
        sample_size,
        preview_rows,
    };
    let analysis = roaster::analyze_payload(&payload, &options);

    eprintln!("   Fields: {}", analysis.schema.len());
    print_issues(&analysis.issues);

    let json = serde_json::to_string_pretty(&analysis)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_execute(
    input: &Path,
    mapping: &Path,
    output: Option<&Path>,
    issues_output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let payload = load_json_file(input)?;
    let spec = load_spec_file(mapping)?;
    eprintln!("   Mapping: {} entries", spec.mappings.len());

    let result = roaster::execute_checked(&payload, &spec)?;
    report(&result, issues_output)?;

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    Ok(())
}

async fn cmd_map(
    input: &Path,
    mapping: &Path,
    options: &AgentOptions,
    output: Option<&Path>,
    save_mapping: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let payload = load_json_file(input)?;
    let spec = load_spec_file(mapping)?;
    eprintln!("   Mapping: {} entries", spec.mappings.len());

    let outcome = map_payload(&payload, spec, options, proposer_from_env()).await?;

    eprintln!("\n🤖 Agent: {}", outcome.stop_reason);
    eprintln!("   Iterations: {}", outcome.iterations);
    eprintln!(
        "   Issues per iteration: {}",
        outcome
            .issue_counts
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" → ")
    );

    report(&outcome.result, None)?;

    if let Some(save_path) = save_mapping {
        fs::write(save_path, outcome.spec.to_json()?)?;
        eprintln!("   💾 Mapping saved to: {}", save_path.display());
    }

    let json = serde_json::to_string_pretty(&outcome.result.records)?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_validate(input: &Path, mapping: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let spec = load_spec_file(mapping)?;
    let Some(schema) = spec.target_schema else {
        return Err("mapping specification declares no target schema".into());
    };

    let content = fs::read_to_string(input)?;
    let records: Vec<Record> = serde_json::from_str(&content)?;
    let result = ExecutionResult {
        records,
        issues: vec![],
    };

    let issues = roaster::validate(&result, &schema);
    print_issues(&issues);

    let violations = roaster::record_violations(&schema, &result.records)?;
    for (i, errors) in violations.iter().take(5) {
        eprintln!("\n❌ Record {} invalid:", i);
        for err in errors.iter().take(3) {
            eprintln!("   - {}", err);
        }
    }

    let errors = issues.iter().filter(|i| i.is_error()).count();
    eprintln!(
        "\n📊 Results: {} records, {} issues ({} errors), {} records with strict violations",
        result.records.len(),
        issues.len(),
        errors,
        violations.len()
    );

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_example_spec() -> Result<(), Box<dyn std::error::Error>> {
    let spec = example_spec();
    let json = spec.to_json()?;
    println!("{}", json);
    Ok(())
}

fn cmd_transforms() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", transforms_description());
    Ok(())
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    roaster::server::start_server(port).await
}

fn report(result: &ExecutionResult, issues_output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("\n⚙️  {}", result.summary());
    print_issues(&result.issues);

    if let Some(path) = issues_output {
        fs::write(path, serde_json::to_string_pretty(&result.issues)?)?;
        eprintln!("   💾 Issues saved to: {}", path.display());
    }
    Ok(())
}

fn print_issues(issues: &[Issue]) {
    for issue in issues.iter().take(10) {
        let icon = if issue.is_error() { "❌" } else { "⚠️ " };
        match issue.record {
            Some(r) => eprintln!("   {} {} (record {}): {}", icon, issue.field, r, issue.message),
            None => eprintln!("   {} {}: {}", icon, issue.field, issue.message),
        }
    }
    if issues.len() > 10 {
        eprintln!("   ... and {} more", issues.len() - 10);
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
