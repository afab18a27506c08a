// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Uses `clap` to parse
// arguments and delegates everything else to Layer 2.
//
//   1. `train` - fine-tunes the model and saves a model dir
//   2. `infer` - summarizes one stdin request to stdout
//
// Only program output goes to stdout; logs go to stderr.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InferArgs, TrainArgs};

use crate::ml::generation::GenerationConfig;

#[derive(Parser, Debug)]
#[command(
    name = "summarizer",
    version,
    about = "Fine-tune a pretrained T5 model for summarization, then summarize text from stdin."
)]
pub struct Cli {
    /// The subcommand to run (train or infer)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Infer(args) => run_infer(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Fine-tuning '{}' on {} {}", args.model_name, args.dataset, args.split);

    let use_case = TrainUseCase::new(args.into());
    let saved = use_case.execute()?;
    println!("Model saved to {}", saved.display());

    let summary = use_case.smoke_test(&saved)?;
    println!("Summary: {summary}");
    Ok(())
}

fn run_infer(args: InferArgs) -> Result<()> {
    use crate::application::infer_use_case::InferUseCase;

    let model_dir  = args.resolve_model_dir();
    let generation = GenerationConfig { num_beams: args.num_beams, ..Default::default() };

    let use_case = InferUseCase::new(model_dir, generation, args.backend);
    use_case.run(std::io::stdin().lock(), std::io::stdout().lock())
}
