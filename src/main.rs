// src/main.rs - mod-alarm command line: settings editing and simulated runs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mod_alarm::{default_backend, simulator, AppDirs, ConfigEditor, ModAlarm, Scenario};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "mod-alarm")]
#[command(about = "Sound alarm module for SCADA channels", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the module against a recorded scenario
    Run {
        /// Directory holding ModAlarm.xml
        #[arg(short, long, default_value = "./config")]
        config_dir: PathBuf,
        /// Directory for ModAlarm.log and ModAlarm.txt
        #[arg(short, long, default_value = "./log")]
        log_dir: PathBuf,
        /// YAML scenario of channel values
        #[arg(short, long)]
        scenario: PathBuf,
    },
    /// List configured alarms
    List {
        #[arg(short, long, default_value = "./config")]
        config_dir: PathBuf,
    },
    /// Add an alarm
    Add {
        #[arg(short, long, default_value = "./config")]
        config_dir: PathBuf,
        /// Defaults to the channel after the last configured one
        channel: Option<i64>,
        /// Defaults to the sound of the last configured alarm
        sound: Option<PathBuf>,
        /// Replace the alarm if the channel is already configured
        #[arg(long)]
        replace: bool,
    },
    /// Change the channel and/or sound of an alarm
    Update {
        #[arg(short, long, default_value = "./config")]
        config_dir: PathBuf,
        old_channel: i64,
        new_channel: i64,
        sound: PathBuf,
    },
    /// Remove an alarm
    Remove {
        #[arg(short, long, default_value = "./config")]
        config_dir: PathBuf,
        channel: i64,
    },
    /// Loop a sound file until Ctrl-C
    Play { sound: PathBuf },
}

#[tokio::main]
async fn main() {
    mod_alarm::init();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli.command).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            config_dir,
            log_dir,
            scenario,
        } => run(AppDirs::new(config_dir, log_dir), &scenario).await,
        Commands::List { config_dir } => list(&config_dir),
        Commands::Add {
            config_dir,
            channel,
            sound,
            replace,
        } => edit(&config_dir, |editor| {
            let id = editor.add_or_suggested(channel, sound.as_deref(), replace)?;
            info!("Alarm on channel {} added", id);
            Ok(())
        }),
        Commands::Update {
            config_dir,
            old_channel,
            new_channel,
            sound,
        } => edit(&config_dir, |editor| {
            editor.update(old_channel, new_channel, &sound)?;
            Ok(())
        }),
        Commands::Remove {
            config_dir,
            channel,
        } => edit(&config_dir, |editor| {
            editor.remove(channel)?;
            Ok(())
        }),
        Commands::Play { sound } => {
            simulator::play(default_backend(), &sound)
                .await
                .with_context(|| format!("playing {}", sound.display()))?;
            info!("Stopped {}", sound.display());
            Ok(())
        }
    }
}

async fn run(dirs: AppDirs, scenario_path: &Path) -> Result<()> {
    let scenario = Scenario::from_file(scenario_path)
        .with_context(|| format!("reading scenario {}", scenario_path.display()))?;
    info!(
        "mod-alarm v{} running {} ticks every {} ms from {}",
        mod_alarm::VERSION,
        scenario.ticks.len(),
        scenario.interval_ms,
        scenario_path.display()
    );

    let mut module = ModAlarm::new(default_backend());
    let summary = simulator::run(&mut module, &dirs, &scenario).await?;

    info!(
        "Final stats: {} ticks, {} alarms started, {} stopped, {} failures{}",
        summary.ticks,
        summary.started,
        summary.stopped,
        summary.failures,
        if summary.interrupted { " (interrupted)" } else { "" }
    );
    Ok(())
}

fn list(config_dir: &Path) -> Result<()> {
    let editor = ConfigEditor::open(config_dir)
        .with_context(|| format!("opening settings in {}", config_dir.display()))?;
    if editor.config().is_empty() {
        println!("No alarms configured in {}", editor.path().display());
        return Ok(());
    }

    println!("{:>7}  Sound", "Channel");
    for (channel, sound) in editor.config().iter() {
        let marker = if sound.is_file() { "" } else { "  [missing]" };
        println!("{:>7}  {}{}", channel.get(), sound.display(), marker);
    }
    Ok(())
}

fn edit(config_dir: &Path, change: impl FnOnce(&mut ConfigEditor) -> Result<()>) -> Result<()> {
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating {}", config_dir.display()))?;
    let mut editor = ConfigEditor::open(config_dir)
        .with_context(|| format!("opening settings in {}", config_dir.display()))?;
    change(&mut editor)?;
    editor.save().context("saving settings")?;
    info!("{} alarms saved to {}", editor.config().len(), editor.path().display());
    Ok(())
}
