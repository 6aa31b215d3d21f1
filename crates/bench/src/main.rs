use clap::Parser;
use palaver_bench::{
    cli::Cli,
    logging,
    metrics,
    report::Report,
    scenario::{self, Context},
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        // Thresholds failed; the report already says which.
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let ctx = Context::new(&cli);
    tracing::info!(
        "running scenario for {} VUs over {} minute(s)",
        cli.vus,
        cli.duration_mins
    );
    scenario::run(&cli, ctx.clone()).await;

    let snapshot = ctx.metrics.snapshot();
    let thresholds = metrics::evaluate_thresholds(&snapshot);
    let report = Report::new(&cli, snapshot, thresholds);

    println!("{}", report.to_json()?);
    if let Some(path) = &cli.output {
        report.write(path)?;
        tracing::info!("report written to {}", path.display());
    }
    Ok(report.passed)
}
