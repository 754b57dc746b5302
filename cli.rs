use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use scheme_sim_engine::batch::{run_parallel, BatchConfig};
use scheme_sim_engine::driver::run_rounds;
use scheme_sim_engine::scheme::{ParticipantScheme, RoundReport, SchemeKind};
use scheme_sim_engine::stats::{collapse_notice, level_counts};
use scheme_sim_engine::types::{FlatParams, ReferralParams};
use scheme_sim_engine::{flat, referral};
use serde::Deserialize;
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scheme-sim", about = "Round-based Ponzi and pyramid scheme simulator")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Model {
	Ponzi,
	Pyramid,
}

impl From<Model> for SchemeKind {
	fn from(m: Model) -> Self {
		match m {
			Model::Ponzi => SchemeKind::Ponzi,
			Model::Pyramid => SchemeKind::Pyramid,
		}
	}
}

#[derive(clap::Args)]
struct RunArgs {
	/// Stop after this many rounds if the scheme is still standing
	#[arg(long, default_value_t = 50)]
	rounds: u32,
	/// Investment (Ponzi) or membership fee (pyramid) paid by each newcomer
	#[arg(long, default_value_t = 500.0)]
	amount: f64,
	#[arg(long, default_value_t = 0)]
	seed: u64,
	/// JSON file with `flat` and/or `referral` parameter overrides
	#[arg(long)]
	config: Option<PathBuf>,
	/// Print the final state as JSON instead of a table
	#[arg(long)]
	json: bool,
}

#[derive(Subcommand)]
enum Commands {
	/// Flat-payout model
	Ponzi(RunArgs),
	/// Referral-commission model
	Pyramid(RunArgs),
	/// Many seeded runs in parallel
	Batch {
		#[arg(long, value_enum)]
		model: Model,
		#[arg(long, default_value_t = 1_000)]
		simulations: usize,
		#[arg(long, default_value_t = 100)]
		max_rounds: u32,
		#[arg(long, default_value_t = 500.0)]
		amount: f64,
		#[arg(long, default_value_t = 0)]
		seed_start: u64,
		#[arg(long)]
		config: Option<PathBuf>,
		#[arg(long)]
		json: bool,
	},
}

/// Parameter overrides read from `--config`.
#[derive(Default, Deserialize)]
#[serde(default)]
struct FileConfig {
	flat: FlatParams,
	referral: ReferralParams,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::builder()
				.with_default_directive(LevelFilter::INFO.into())
				.from_env_lossy(),
		)
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();
	match cli.command {
		Commands::Ponzi(args) => ponzi_cmd(&args),
		Commands::Pyramid(args) => pyramid_cmd(&args),
		Commands::Batch {
			model,
			simulations,
			max_rounds,
			amount,
			seed_start,
			config,
			json,
		} => batch_cmd(model.into(), simulations, max_rounds, amount, seed_start, config.as_deref(), json),
	}
}

fn load_config(path: Option<&Path>) -> Result<FileConfig> {
	let Some(path) = path else {
		return Ok(FileConfig::default());
	};
	let raw = fs::read_to_string(path)
		.with_context(|| format!("failed to read config {}", path.display()))?;
	serde_json::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
}

fn ponzi_cmd(args: &RunArgs) -> Result<()> {
	let cfg = load_config(args.config.as_deref())?;
	let mut state = flat::initial_state(cfg.flat)?;
	let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
	let reports = run_rounds(&mut state, &mut rng, args.amount, args.rounds)?;

	if args.json {
		let payload = json!({
			"model": SchemeKind::Ponzi,
			"seed": args.seed,
			"rounds": reports,
			"summary": state.summary(),
			"investors": state.participants(),
		});
		println!("{}", serde_json::to_string_pretty(&payload)?);
		return Ok(());
	}

	print_rounds(SchemeKind::Ponzi, &reports);
	finish(&state)
}

fn pyramid_cmd(args: &RunArgs) -> Result<()> {
	let cfg = load_config(args.config.as_deref())?;
	let mut state = referral::initial_state(cfg.referral)?;
	let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
	let reports = run_rounds(&mut state, &mut rng, args.amount, args.rounds)?;

	if args.json {
		let payload = json!({
			"model": SchemeKind::Pyramid,
			"seed": args.seed,
			"rounds": reports,
			"summary": state.summary(),
			"levels": level_counts(&state),
			"members": state.participants(),
		});
		println!("{}", serde_json::to_string_pretty(&payload)?);
		return Ok(());
	}

	print_rounds(SchemeKind::Pyramid, &reports);
	println!("\nMembers per level:");
	for (level, count) in level_counts(&state) {
		println!("  Level {:<3} {:>6}", level, count);
	}
	finish(&state)
}

fn print_rounds(kind: SchemeKind, reports: &[RoundReport]) {
	println!("{}", kind.name());
	println!("\nRound   Joined    New Money     Paid Out");
	println!("-----------------------------------------");
	for r in reports {
		println!(
			"{:>5} {:>8} {:>12.2} {:>12.2}{}",
			r.round,
			r.joined,
			r.new_money,
			r.paid_out,
			if r.collapsed { "   << collapse" } else { "" }
		);
	}
}

fn finish<S: ParticipantScheme>(scheme: &S) -> Result<()> {
	let summary = scheme.summary();
	println!("\nSummary:\n{summary}");
	if summary.collapsed {
		println!("\n{}", collapse_notice(S::KIND, &summary));
	}
	Ok(())
}

#[allow(clippy::too_many_arguments)]
fn batch_cmd(
	kind: SchemeKind,
	simulations: usize,
	max_rounds: u32,
	amount: f64,
	seed_start: u64,
	config: Option<&Path>,
	json: bool,
) -> Result<()> {
	let file = load_config(config)?;
	let mut batch = BatchConfig::new(kind);
	batch.amount = amount;
	batch.max_rounds = max_rounds;
	batch.flat = file.flat;
	batch.referral = file.referral;

	let agg = run_parallel(&batch, simulations, seed_start)?;

	if json {
		println!("{}", serde_json::to_string_pretty(&json!({ "config": batch, "result": agg }))?);
		return Ok(());
	}

	println!("=======================================================");
	println!("  {}", kind.name());
	println!("  Simulations: {}, round cap: {}", simulations, max_rounds);
	println!("=======================================================");
	agg.print();
	Ok(())
}
