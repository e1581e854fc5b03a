//! Bamboo regression harness CLI
//!
//! Runs the trainer's layer tests across compiler builds and the model zoo
//! setup sweep under the cluster scheduler.

use bamboo_config::Compiler;
use bamboo_harness::{
    HarnessConfig, MEAN_ABSOLUTE_ERROR, ModelSweep, Outcome, Runner, Session, SessionOverrides,
    build_command,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bamboo", about = "Trainer regression harness")]
struct Cli {
    #[command(flatten)]
    session: SessionOverrides,

    /// Path to bamboo.toml config file (defaults apply if it does not exist)
    #[arg(short, long, default_value = "bamboo.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mean_absolute_error layer test for each compiler build
    Unit {
        /// Compilers to test (default: all)
        #[arg(long = "compiler", value_enum)]
        compilers: Vec<Compiler>,
    },

    /// Check that every model in the model zoo gets through trainer setup
    Sweep,

    /// Print the layer test command for a compiler without running it
    Command {
        #[arg(long, value_enum)]
        compiler: Compiler,
    },

    /// Show the resolved session
    Info,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // tracing needs to be initialized with indicatif_layer to not clobber progress bars
    let indicatif_layer = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .with(indicatif_layer)
        .init();

    let cli = Cli::parse();
    let config = HarnessConfig::load_or_default(&cli.config)?;
    let session = Session::resolve(&cli.session)?;

    match cli.command {
        Commands::Unit { compilers } => {
            let compilers = if compilers.is_empty() {
                Compiler::ALL.to_vec()
            } else {
                compilers
            };
            let runner = Runner::default();

            let mut passed = 0;
            let mut failed = 0;
            let mut skipped = 0;

            for compiler in compilers {
                let id = MEAN_ABSOLUTE_ERROR.id(compiler);
                match MEAN_ABSOLUTE_ERROR
                    .run(&runner, &session, &config.scheduler, compiler)
                    .await
                {
                    Ok(outcome) => {
                        match outcome {
                            Outcome::Passed => passed += 1,
                            Outcome::Failed { .. } => failed += 1,
                            Outcome::Skipped(_) => skipped += 1,
                        }
                        println!("{id}: {outcome}");
                    }
                    Err(e) => {
                        failed += 1;
                        println!("{id}: FAILED ({e})");
                    }
                }
            }

            println!();
            println!("=== Layer Tests ===");
            println!("Passed: {passed}");
            println!("Failed: {failed}");
            println!("Skipped: {skipped}");

            if failed > 0 {
                return Err(format!("{failed} layer tests failed").into());
            }
        }

        Commands::Sweep => {
            let sweep = ModelSweep::new(&session, &config.sweep, &config.scheduler);
            println!("Sweeping {} with {}", sweep.models_dir.display(), sweep.exe.display());

            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] {msg:40} [{wide_bar:.cyan/blue}] {pos:>4}/{len:4}")?
                    .progress_chars("#*-"),
            );

            let report = sweep.run(&Runner::default(), &pb).await?;

            println!();
            println!("=== Model Sweep ===");
            println!("Checked: {}", report.attempted);
            println!("Defective: {}", report.defective.len());
            if !report.unclassified.is_empty() {
                println!("No data reader known for:");
                for name in &report.unclassified {
                    println!("  - {name}");
                }
            }

            report.finish(&mut std::io::stdout().lock())?;
        }

        Commands::Command { compiler } => match MEAN_ABSOLUTE_ERROR.invocation(&session, compiler) {
            Ok(invocation) => println!("{}", build_command(&invocation, &config.scheduler)),
            Err(reason) => println!("{}: SKIPPED ({reason})", MEAN_ABSOLUTE_ERROR.id(compiler)),
        },

        Commands::Info => {
            println!("Cluster: {}", session.cluster);
            println!("Dirname: {}", session.dirname.display());
            match session.exe {
                Some(ref exe) => println!("Exe: {}", exe.display()),
                None => println!("Exe: (none, nightly build at {})", session.nightly_exe().display()),
            }
            if session.exes.is_empty() {
                println!("Compiler builds: none found");
            } else {
                println!("Compiler builds:");
                for (compiler, path) in session.exes.iter() {
                    println!("  {compiler:8} {}", path.display());
                }
            }
        }
    }

    Ok(())
}
