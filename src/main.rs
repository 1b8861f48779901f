/*!
# DCL Analyzer CLI

Command-line front end: diagnostics, scope listing, mutation applicability and mutation runs over a
single build configuration file.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dcl_analyzer::analysis::{collect_diagnostics, AssignmentTracer, DiagnosticSeverity, ReferenceAnalyzer};
use dcl_analyzer::cli_common::{self, parse_arguments, print_error, print_success, print_warning, validate_path};
use dcl_analyzer::config::MutationSettings;
use dcl_analyzer::dom::resolution::DocumentWithResolution;
use dcl_analyzer::mutation::{
    load_catalog, MutationApplicability, MutationApplicabilityChecker, MutationRunner, MutationStepResult, Scope,
    ScopeLocationMatcher,
};
use dcl_analyzer::schema::AnalysisSchema;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "dcl-analyzer",
    version = env!("CARGO_PKG_VERSION"),
    about = "Query and mutation engine for declarative build configuration files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Mutation settings file (TOML or YAML)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report syntax, resolution and assignment problems
    Check {
        #[arg(short, long)]
        schema: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List every scope of the document
    Scopes {
        #[arg(short, long)]
        schema: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show where each recipe of a catalog would apply
    Applicable {
        #[arg(short, long)]
        schema: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
        /// Recipe file (TOML or YAML)
        #[arg(short, long)]
        recipes: PathBuf,
    },

    /// Run one recipe against the document
    Apply {
        #[arg(short, long)]
        schema: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long)]
        recipes: PathBuf,
        /// Recipe id
        #[arg(long)]
        recipe: String,
        /// Recipe argument, `name=value`; repeatable
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Overwrite the file instead of printing the result
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli_common::init_logging(cli.verbose) {
        eprintln!("{}", e);
    }

    match run(cli) {
        Ok(success) => std::process::exit(if success { 0 } else { 1 }),
        Err(e) => {
            print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let settings = match &cli.settings {
        Some(path) => MutationSettings::load_from_file(path)?,
        None => MutationSettings::default(),
    };
    let analyzer = ReferenceAnalyzer::new(&settings);

    match cli.command {
        Commands::Check { schema, file } => {
            let schema = load_schema(&schema)?;
            let text = read_source(&file)?;
            let (document, mut resolved) = analyzer.analyze_full(&schema, &text);
            let trace = AssignmentTracer::new(&schema)
                .trace(&mut resolved.origins, &resolved.effects)
                .context("assignment tracing failed")?;
            let diagnostics = collect_diagnostics(
                &file.display().to_string(),
                &schema,
                &document.document,
                &document.resolution,
                &resolved.origins,
                &trace,
            );
            let has_errors = diagnostics.iter().any(|d| d.severity == DiagnosticSeverity::Error);

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&diagnostics)?);
            } else if diagnostics.is_empty() {
                print_success("no problems found");
            } else {
                for d in &diagnostics {
                    let severity = match d.severity {
                        DiagnosticSeverity::Error => "error".red().bold(),
                        DiagnosticSeverity::Warning => "warning".yellow().bold(),
                        DiagnosticSeverity::Info => "info".blue().bold(),
                    };
                    println!(
                        "{}:{}:{}: {} [{}] {}",
                        d.location.file, d.location.line, d.location.column, severity, d.code, d.message
                    );
                }
            }
            Ok(!has_errors)
        }

        Commands::Scopes { schema, file } => {
            let schema = load_schema(&schema)?;
            let document = analyze(&analyzer, &schema, &file)?;
            let scopes = ScopeLocationMatcher::new(&schema, &document).all_scopes();
            let described: Vec<String> = scopes.iter().map(|s| describe_scope(&document, s)).collect();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&described)?);
            } else {
                for (scope, text) in scopes.iter().zip(&described) {
                    println!("{}{}", "  ".repeat(scope.depth()), text);
                }
            }
            Ok(true)
        }

        Commands::Applicable { schema, file, recipes } => {
            let schema = load_schema(&schema)?;
            let document = analyze(&analyzer, &schema, &file)?;
            let catalog = load_catalog(&recipes)?;
            let applicable = MutationApplicabilityChecker::new(&schema, &document).check_applicability(&catalog);
            info!(catalog = catalog.len(), applicable = applicable.len(), "applicability computed");

            if cli.json {
                let entries: Vec<_> = applicable
                    .iter()
                    .map(|a| {
                        json!({
                            "id": a.definition.id(),
                            "name": a.definition.name(),
                            "applicability": a.applicability.iter().map(|x| describe_applicability(&document, x)).collect::<Vec<_>>(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if applicable.is_empty() {
                print_warning("no recipe applies to this document");
            } else {
                for a in &applicable {
                    println!("{} {}", a.definition.id().bold(), a.definition.name().dimmed());
                    for entry in &a.applicability {
                        println!("    {}", describe_applicability(&document, entry));
                    }
                }
            }
            Ok(true)
        }

        Commands::Apply { schema, file, recipes, recipe, args, write } => {
            let schema = load_schema(&schema)?;
            let document = analyze(&analyzer, &schema, &file)?;
            let catalog = load_catalog(&recipes)?;
            let definition = catalog
                .get(&recipe)
                .ok_or_else(|| anyhow::anyhow!("recipe '{}' not found in {}", recipe, recipes.display()))?;
            let arguments = parse_arguments(&args, &definition.parameters())?;

            let result = MutationRunner::new(&analyzer, settings).run(&schema, definition.as_ref(), document, &arguments)?;

            if cli.json {
                let steps: Vec<_> = result
                    .steps
                    .iter()
                    .map(|s| match s {
                        MutationStepResult::ModelMutationStepApplied { step, unsuccessful, .. } => {
                            json!({ "step": step, "applied": true, "unsuccessful": unsuccessful.len() })
                        }
                        MutationStepResult::ModelMutationFailed { step, unsuccessful } => json!({
                            "step": step,
                            "applied": false,
                            "failures": unsuccessful.iter().map(|u| format!("{:?}", u.reason)).collect::<Vec<_>>(),
                        }),
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "steps": steps,
                        "issues": result.issues.iter().map(|i| format!("{:?}", i)).collect::<Vec<_>>(),
                        "text": result.final_text(),
                    }))?
                );
            } else {
                for step in &result.steps {
                    match step {
                        MutationStepResult::ModelMutationStepApplied { step, unsuccessful, .. } if unsuccessful.is_empty() => {
                            print_success(&format!("step {} applied", step));
                        }
                        MutationStepResult::ModelMutationStepApplied { step, unsuccessful, .. } => {
                            print_warning(&format!("step {} applied, {} edit(s) skipped", step, unsuccessful.len()));
                        }
                        MutationStepResult::ModelMutationFailed { step, unsuccessful } => {
                            for u in unsuccessful {
                                print_error(&format!("step {} failed: {:?} ({})", step, u.reason, u.request.location));
                            }
                        }
                    }
                }
                for issue in &result.issues {
                    print_warning(&format!("{:?}", issue));
                }
                if !write {
                    print!("{}", result.final_text());
                }
            }

            if write && !result.steps.is_empty() {
                std::fs::write(&file, result.final_text())
                    .with_context(|| format!("Failed to write {}", file.display()))?;
                info!(file = %file.display(), "mutated text written");
            }
            Ok(result.is_successful())
        }
    }
}

fn load_schema(path: &Path) -> Result<AnalysisSchema> {
    validate_path(path, "Schema file")?;
    dcl_analyzer::load_schema(path)
}

fn read_source(path: &Path) -> Result<String> {
    validate_path(path, "Source file")?;
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn analyze(analyzer: &ReferenceAnalyzer, schema: &AnalysisSchema, path: &Path) -> Result<DocumentWithResolution> {
    use dcl_analyzer::analysis::DocumentAnalyzer;
    let text = read_source(path)?;
    analyzer.analyze(schema, &text)
}

fn describe_scope(document: &DocumentWithResolution, scope: &Scope) -> String {
    if scope.is_top_level() {
        return "<top-level>".to_string();
    }
    let index = document.document.line_index();
    scope
        .elements
        .iter()
        .map(|id| {
            let name = document.document.element(*id).map(|e| e.name.as_str()).unwrap_or("?");
            let line = index.to_position(document.document.node_source(*id).span.start).line + 1;
            format!("{}@{}", name, line)
        })
        .collect::<Vec<_>>()
        .join(" > ")
}

fn describe_applicability(document: &DocumentWithResolution, entry: &MutationApplicability) -> String {
    match entry {
        MutationApplicability::AffectedNode(id) => {
            let line = document.document.line_index().to_position(document.document.node_source(*id).span.start).line + 1;
            let first_line = document.document.node_text(*id).lines().next().unwrap_or("");
            format!("line {}: {}", line, first_line.trim())
        }
        MutationApplicability::ScopeWithoutAffectedNodes(scope) => format!("in {}", describe_scope(document, scope)),
    }
}
