use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use dosbox_config::{Dialect, Document, MappingTable, Sanitizer, Variant};
use dosdeck_driver::config::default_config_path;
use dosdeck_driver::process;
use dosdeck_driver::{
    ItemStore, JsonItemStore, LaunchContext, LaunchPlan, LaunchRequest, LaunchState, LaunchStatus,
    LaunchTarget, LauncherConfig, build_command_line,
};
use env_logger::Env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
struct Cli {
    /// Launcher config file [default: per-user config directory]
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the emulator build a reference config was generated by
    Detect { reference: PathBuf },
    /// Translate the settings in a config file to another dialect and print the result
    Sanitize {
        /// Config file whose settings are sanitized
        settings_file: PathBuf,

        /// Target dialect (standard, staging, x)
        #[arg(long)]
        dialect: Dialect,

        /// Reference config of the target emulator; only keys it defines are kept and the output
        /// is reduced to values that differ from it
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Key mapping table [default: from launcher config]
        #[arg(long)]
        mappings: Option<PathBuf>,

        /// Use protected-mode spellings where a dialect splits real and protected mode settings
        #[arg(long, default_value_t)]
        protected: bool,
    },
    /// Print the engine, override layer and autoexec an item would launch with
    Plan(LaunchArgs),
    /// Launch an item and wait for the emulator to exit
    Launch(LaunchArgs),
}

#[derive(Args)]
struct LaunchArgs {
    item_id: String,

    /// Executable to run instead of the main program, relative to the item root
    #[arg(long, conflicts_with = "dos_prompt")]
    exe: Option<String>,

    /// Mount drives and stop at the DOS prompt
    #[arg(long, default_value_t)]
    dos_prompt: bool,

    /// Emulator executable overriding the item's and the configured engines
    #[arg(long)]
    emulator: Option<PathBuf>,

    /// Treat the program as protected mode (true) or real mode (false) instead of detecting it
    #[arg(long)]
    protected_mode: Option<bool>,

    #[arg(long, default_value_t)]
    fullscreen: bool,

    /// Close the emulator when the program exits
    #[arg(long, default_value_t)]
    auto_exit: bool,

    /// Directory for screenshots and recordings
    #[arg(long)]
    capture_dir: Option<PathBuf>,
}

impl LaunchArgs {
    fn to_request(&self) -> LaunchRequest {
        let target = if self.dos_prompt {
            LaunchTarget::DosPrompt
        } else if let Some(exe) = &self.exe {
            LaunchTarget::Specific(exe.clone())
        } else {
            LaunchTarget::Main
        };

        LaunchRequest {
            target,
            engine_override: self.emulator.clone(),
            protected_mode: self.protected_mode,
            fullscreen: self.fullscreen,
            auto_exit: self.auto_exit,
            capture_dir: self.capture_dir.clone(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    log::debug!("Loading launcher config from '{}'", config_path.display());
    let config = LauncherConfig::from_file(&config_path);

    match cli.command {
        Command::Detect { reference } => detect(&reference),
        Command::Sanitize { settings_file, dialect, reference, mappings, protected } => {
            let mappings = mappings.unwrap_or_else(|| config.mapping_table_path());
            sanitize(&settings_file, dialect, reference, &mappings, protected)
        }
        Command::Plan(args) => {
            let (_, plan) = plan_launch(config, &args)?;
            print_plan(&plan);
            Ok(())
        }
        Command::Launch(args) => launch(config, &args),
    }
}

fn detect(reference: &Path) -> anyhow::Result<()> {
    let text = fs::read_to_string(reference)
        .with_context(|| format!("Unable to read '{}'", reference.display()))?;

    let variant = Variant::detect(&text);
    println!("{variant}");
    if variant.is_unknown() {
        log::warn!("No version banner found; assuming {}", variant.dialect_or_default());
    }

    Ok(())
}

fn sanitize(
    settings_file: &Path,
    dialect: Dialect,
    reference: Option<PathBuf>,
    mappings: &Path,
    protected: bool,
) -> anyhow::Result<()> {
    let text = fs::read_to_string(settings_file)
        .with_context(|| format!("Unable to read '{}'", settings_file.display()))?;
    let settings = Document::parse(&text).to_settings();
    let table = MappingTable::load(mappings)?;

    let reference = reference
        .map(|path| {
            fs::read_to_string(&path)
                .map(|text| Document::parse(&text))
                .with_context(|| format!("Unable to read '{}'", path.display()))
        })
        .transpose()?;

    let mut sanitizer = Sanitizer::new(&table);
    if let Some(reference) = &reference {
        sanitizer = sanitizer.with_reference(reference);
    }
    let sanitized = sanitizer.sanitize(&settings, dialect, protected);

    for translation in &sanitized.translated {
        log::info!("{} -> {}", translation.from, translation.to);
    }
    for dropped in &sanitized.dropped {
        log::warn!("Dropped {}: {}", dropped.key, dropped.reason);
    }

    let output = match &reference {
        Some(reference) => dosbox_config::diff(&sanitized.settings, reference),
        None => {
            let mut document = Document::new();
            document.apply(&sanitized.settings);
            document
        }
    };
    println!("{}", output.serialize());

    Ok(())
}

fn plan_launch(
    config: LauncherConfig,
    args: &LaunchArgs,
) -> anyhow::Result<(JsonItemStore, LaunchPlan)> {
    let store = JsonItemStore::from_config(&config);
    let record = store.item(&args.item_id)?;

    let mut context = LaunchContext::new(config)?;
    let plan = context.plan(&record, &args.to_request())?;

    Ok((store, plan))
}

fn print_plan(plan: &LaunchPlan) {
    println!("Emulator: {} ({})", plan.emulator.display(), plan.dialect);
    println!("Reference: {}", plan.reference.display());
    println!("Working directory: {}", plan.working_dir.display());
    match &plan.program {
        Some(program) => println!("Program: {program}"),
        None => println!("Program: DOS prompt"),
    }

    println!("\n# overrides");
    println!("{}", plan.overrides.serialize());
    println!("\n# autoexec");
    print!("{}", plan.autoexec.render());

    for dropped in &plan.sanitized.dropped {
        log::warn!("Dropped {}: {}", dropped.key, dropped.reason);
    }
}

fn launch(config: LauncherConfig, args: &LaunchArgs) -> anyhow::Result<()> {
    let work_dir = config.work_dir();
    let poll_interval = config.poll_interval();

    let status = LaunchStatus::new();
    status.set(LaunchState::Planning);

    let (store, plan) = match plan_launch(config, args) {
        Ok(planned) => planned,
        Err(err) => {
            status.set(LaunchState::Idle);
            return Err(err);
        }
    };

    if let Some(capture_dir) = &args.capture_dir {
        fs::create_dir_all(capture_dir).with_context(|| {
            format!("Unable to create capture directory '{}'", capture_dir.display())
        })?;
    }

    let layers = plan.write_layers(&work_dir)?;
    let command = build_command_line(&plan, &layers);

    let item_id = plan.item_id.clone();
    let is_main = plan.is_main;
    let exit_layers = layers.clone();
    let handle = process::spawn_monitored(
        &command,
        &plan.working_dir,
        poll_interval,
        status.clone(),
        move |outcome| {
            exit_layers.cleanup();
            if is_main && let Err(err) = store.record_session(&item_id, outcome) {
                log::error!("Unable to update play statistics for '{item_id}': {err}");
            }
        },
    )
    .inspect_err(|_| layers.cleanup())?;

    log::info!("Emulator running with pid {}", handle.pid());

    let outcome = handle.wait().ok_or_else(|| anyhow!("Emulator monitor thread panicked"))?;
    log::info!("Session ended after {:.1}s", outcome.duration.as_secs_f64());
    if !outcome.success() {
        log::warn!("Emulator exited with {:?}", outcome.status);
    }

    Ok(())
}
