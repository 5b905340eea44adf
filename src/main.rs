use std::path::PathBuf;

use clap::Parser;
use tch::{Kind, Tensor};

use a3c_network::logging::setup_logging;
use a3c_network::{NetworkConfig, PolicyNetwork};

#[derive(Parser, Debug)]
#[command(name = "a3c_network", about = "Build the A3C policy network and run one forward pass")]
struct Cli {
    /// JSON network config; overrides the shape flags below
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of discrete actions
    #[arg(short = 'a', long, default_value_t = 4)]
    num_actions: i64,

    /// Input state width
    #[arg(long, default_value_t = 84)]
    width: i64,

    /// Input state height
    #[arg(long, default_value_t = 84)]
    height: i64,

    /// Input state depth
    #[arg(long, default_value_t = 3)]
    depth: i64,

    /// Number of states in the forward pass
    #[arg(
        short = 'b',
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(i64).range(1..)
    )]
    batch_size: i64,

    /// Seed for parameter initialisation
    #[arg(long)]
    seed: Option<i64>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write rotating log files here instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _logger = setup_logging(&cli.log_level, cli.log_dir.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => NetworkConfig::from_json_file(path)?,
        None => NetworkConfig::new(cli.num_actions, (cli.width, cli.height, cli.depth)),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let net = PolicyNetwork::new(config)?;
    println!("{}", net.summary());

    let (width, height, depth) = net.config().state_shape;
    let states = Tensor::zeros(
        [cli.batch_size, width, height, depth],
        (Kind::Float, net.config().device),
    );
    let out = tch::no_grad(|| net.forward(&states, net.initial_state()))?;

    log::info!(
        "forward pass: logits {:?}, value {:?}, state ({:?}, {:?})",
        out.logits.size(),
        out.value.size(),
        out.state.cell.size(),
        out.state.hidden.size()
    );
    let probs = out.logits.softmax(-1, Kind::Float);
    println!("\n📊 Action probabilities (first row):");
    for action in 0..net.num_actions() {
        println!("   Action {}: {:.4}", action, probs.double_value(&[0, action]));
    }
    println!("📈 Value (first row): {:.4}", out.value.double_value(&[0, 0]));

    Ok(())
}
