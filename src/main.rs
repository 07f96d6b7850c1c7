use std::io::Read;
use std::path::Path;

use anyhow::Context;
use clap::Parser;

use dermbill_backend::analyzer::BillingAnalyzer;
use dermbill_backend::cli::{self, AnalyzeArgs, LookupArgs};
use dermbill_backend::models::{AnalysisResult, CodeStatus};
use dermbill_backend::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = cli::Args::parse();

    match args.cmd {
        cli::Command::Serve(cmd) => server::run(cmd).await.context("serve failed"),
        cli::Command::Analyze(cmd) => run_analyze(cmd).context("analyze failed"),
        cli::Command::Lookup(cmd) => run_lookup(cmd).context("lookup failed"),
    }
}

fn run_analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let note = match &args.note_file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("read {path}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read note from stdin")?;
            buf
        }
    };
    if note.trim().len() < 10 {
        anyhow::bail!("note must be at least 10 characters");
    }

    let analyzer = BillingAnalyzer::load(Path::new(&args.data_dir))?;
    let result = analyzer.analyze(&note)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn run_lookup(args: LookupArgs) -> anyhow::Result<()> {
    let analyzer = BillingAnalyzer::load(Path::new(&args.data_dir))?;
    match analyzer.code_db().get_code(&args.code) {
        Some(info) => println!("{}", serde_json::to_string_pretty(info)?),
        None => anyhow::bail!("unknown code {}", args.code),
    }
    Ok(())
}

fn status_label(status: CodeStatus) -> &'static str {
    match status {
        CodeStatus::Supported => "supported",
        CodeStatus::MissingDocumentation => "missing documentation",
        CodeStatus::CountUnspecified => "count unspecified",
        CodeStatus::Flagged => "flagged",
    }
}

fn print_summary(result: &AnalysisResult) {
    println!("Billable codes:");
    for line in &result.current_billing.codes {
        let modifier = line
            .modifier
            .as_deref()
            .map(|m| format!("-{m}"))
            .unwrap_or_default();
        println!(
            "  {}{}  x{}  {:>5.2} wRVU  {} [{}]",
            line.code,
            modifier,
            line.units,
            line.wrvu,
            line.description,
            status_label(line.status)
        );
    }
    println!("Total: {:.2} wRVU", result.current_billing.total_wrvu);

    if !result.current_billing.documentation_gaps.is_empty() {
        println!("\nDocumentation gaps:");
        for gap in &result.current_billing.documentation_gaps {
            println!("  - {gap}");
        }
    }

    let enhancements = &result.documentation_enhancements;
    if !enhancements.enhancements.is_empty() {
        println!("\nDocumentation enhancements (+{:.2} wRVU):", enhancements.improvement);
        for e in &enhancements.enhancements {
            println!("  - {}: {}", e.issue, e.suggested_addition);
        }
    }

    let opportunities = &result.future_opportunities;
    if !opportunities.opportunities.is_empty() {
        println!("\nFuture opportunities:");
        for o in &opportunities.opportunities {
            println!("  - [{}] {}: {}", o.category, o.opportunity, o.action);
        }
    }

    println!("\n{}", result.compliance_notice);
}
