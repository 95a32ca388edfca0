//! Train DDPG on the pendulum swing-up task.
//!
//! Usage: `pendulum-ddpg [CONFIG.json]`
use relearn_ddpg::checkpoint::Checkpointer;
use relearn_ddpg::envs::{Environment, Pendulum, PendulumConfig};
use relearn_ddpg::logging::{ByTime, DisplayLogger, TensorBoardLogger};
use relearn_ddpg::simulation::update_chunker;
use relearn_ddpg::torch::{DdpgConfig, DdpgEvaluator};
use relearn_ddpg::{train_async, TrainConfig};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct RunConfig {
    train: TrainConfig,
    ddpg: DdpgConfig,
    pendulum: PendulumConfig,
    env_seed: u64,
    checkpoint_dir: PathBuf,
    log_dir: PathBuf,
    model_name: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            train: TrainConfig::default(),
            ddpg: DdpgConfig::default(),
            pendulum: PendulumConfig::default(),
            env_seed: 1,
            checkpoint_dir: ["data", "pendulum-ddpg", "model"].iter().collect(),
            log_dir: ["data", "pendulum-ddpg", "logs"].iter().collect(),
            model_name: "DdpgModel".into(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config: RunConfig = match env::args_os().nth(1) {
        Some(path) => serde_json::from_slice(&fs::read(path)?)?,
        None => RunConfig::default(),
    };
    println!("Config\n{:#?}\n", config);

    let mut log_dir = config.log_dir.clone();
    log_dir.push(chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string());
    fs::create_dir_all(&log_dir)?;
    fs::write(log_dir.join("config.json"), serde_json::to_vec_pretty(&config)?)?;
    println!("Logging to {:?}", log_dir);

    let env = Pendulum::new(config.pendulum, config.env_seed);
    let mut evaluator = DdpgEvaluator::new(env.state_dim(), &env.action_bounds(), &config.ddpg)?;
    let checkpointer = Checkpointer::new(&config.checkpoint_dir);
    let start = checkpointer.load(&mut evaluator)?;

    let mut logger = (
        DisplayLogger::new(ByTime::new(Duration::from_secs(1))),
        TensorBoardLogger::new(update_chunker(), &log_dir),
    );

    let summary = train_async(
        &mut evaluator,
        env,
        &config.train,
        start.step,
        &mut logger,
    )?;
    checkpointer.save(&evaluator, &config.model_name, summary.final_step)?;
    Ok(())
}
