use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pde_classpath::{
    validate_classpath, ClasspathContext, ClasspathEntry, ClasspathResolver, ClasspathSettings,
    InMemoryJavaModel, JavaModel, ResolveMode,
};
use pde_config::PdeConfig;
use pde_container::{ContainerError, ContainerManager};
use pde_core::MatchRule;
use pde_model::{loader, BundleUniverse, FeatureIndex, FsWorkspace};
use pde_scheduler::{CancellationToken, Scheduler, SchedulerConfig, WorkspaceLock};
use pde_target::{
    LoadTargetOperation, LoadTargetReport, TargetDefinition, TargetPreferences, VariableResolver,
};
use serde::Serialize;

/// Saved target preferences, relative to the workspace root.
const TARGET_PREFERENCES: &str = ".pde/target.json";

#[derive(Parser)]
#[command(name = "pde", version, about = "PDE classpath computation and target platform tools")]
struct Cli {
    /// Workspace root (defaults to current directory)
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the classpath of one plug-in project
    Classpath(ClasspathArgs),
    /// Run one required-plug-ins container pass over every workspace plug-in
    Resolve(ResolveArgs),
    /// Load a target definition and make it the active target
    LoadTarget(LoadTargetArgs),
    /// Check whether a candidate (id, version) satisfies a requirement
    Match(MatchArgs),
}

#[derive(Args)]
struct ClasspathArgs {
    /// Project name
    project: String,
    /// Write dependencies into the classpath instead of the required-plug-ins container
    #[arg(long)]
    explicit: bool,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ResolveArgs {
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct LoadTargetArgs {
    /// Target definition (TOML)
    file: PathBuf,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct MatchArgs {
    candidate_id: String,
    candidate_version: String,
    required_id: String,
    required_version: String,
    /// none, equivalent, compatible, perfect or greaterOrEqual
    #[arg(long, default_value = "compatible")]
    rule: MatchRule,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Classpath(args) => classpath(&cli.workspace, args),
        Command::Resolve(args) => resolve(&cli.workspace, args),
        Command::LoadTarget(args) => load_target(&cli.workspace, args),
        Command::Match(args) => {
            let matched = pde_core::matches(
                &args.candidate_id,
                Some(args.candidate_version.as_str()),
                &args.required_id,
                Some(args.required_version.as_str()),
                args.rule,
            );
            if args.json {
                print_json(&MatchOutput {
                    matches: matched,
                    rule: args.rule,
                })?;
            } else {
                println!("{matched}");
            }
            Ok(if matched { 0 } else { 1 })
        }
    }
}

/// A loaded workspace: configuration, the restored target and every open project.
struct Session {
    root: PathBuf,
    config: PdeConfig,
    workspace: Arc<FsWorkspace>,
    universe: Arc<BundleUniverse>,
    features: Arc<FeatureIndex>,
}

impl Session {
    fn open(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("workspace {} not found", root.display()))?;
        let (config, _) = pde_config::load_for_workspace(&root)
            .with_context(|| format!("failed to load configuration for {}", root.display()))?;
        pde_config::init_tracing(&config.logging);

        let session = Self {
            workspace: Arc::new(FsWorkspace::new(&root)),
            universe: Arc::new(BundleUniverse::new()),
            features: Arc::new(FeatureIndex::new()),
            root,
            config,
        };

        let projects = loader::scan_workspace(
            session.workspace.as_ref(),
            &session.universe,
            &session.features,
        );
        let prefs = session.preferences()?;
        session.target_operation().restore(&prefs);
        tracing::debug!(target = "pde.cli", projects, "workspace loaded");
        Ok(session)
    }

    fn preferences_path(&self) -> PathBuf {
        self.root.join(TARGET_PREFERENCES)
    }

    fn preferences(&self) -> Result<TargetPreferences> {
        let path = self.preferences_path();
        TargetPreferences::load(&path)
            .with_context(|| format!("failed to read target preferences {}", path.display()))
    }

    fn target_operation(&self) -> LoadTargetOperation {
        LoadTargetOperation::new(
            Arc::clone(&self.universe),
            Arc::clone(&self.features),
            VariableResolver::new(self.config.target.eclipse_home.clone(), &self.root),
        )
    }

    fn context(&self, java: Arc<dyn JavaModel>) -> ClasspathContext {
        ClasspathContext::new(
            Arc::clone(&self.universe),
            Arc::clone(&self.features),
            self.workspace.clone(),
            java,
            ClasspathSettings::from_config(&self.config),
        )
    }
}

#[derive(Serialize)]
struct ClasspathOutput {
    project: String,
    mode: &'static str,
    entries: Vec<ClasspathEntry>,
    error: Option<String>,
}

fn classpath(root: &Path, args: ClasspathArgs) -> Result<i32> {
    let session = Session::open(root)?;
    let ctx = session.context(Arc::new(InMemoryJavaModel::new()));
    let Some(plugin) = ctx.universe.find_by_project(&args.project) else {
        eprintln!("{}: no plug-in descriptor", args.project);
        return Ok(1);
    };
    let (mode, mode_name) = if args.explicit {
        (ResolveMode::Explicit, "explicit")
    } else {
        (ResolveMode::Dynamic, "dynamic")
    };

    let entries = ClasspathResolver::new(&ctx)
        .compute_classpath(&plugin, mode)
        .with_context(|| format!("failed to compute the classpath of {}", args.project))?;
    let output_location = ctx.java.output_location(&args.project);
    let error = validate_classpath(&args.project, &entries, &output_location).err();

    let out = ClasspathOutput {
        project: args.project,
        mode: mode_name,
        entries,
        error,
    };
    if args.json {
        print_json(&out)?;
    } else {
        for entry in &out.entries {
            println!("{entry}");
        }
        if let Some(error) = &out.error {
            println!("invalid: {error}");
        }
    }
    Ok(if out.error.is_some() { 1 } else { 0 })
}

#[derive(Serialize)]
struct ResolveOutput {
    queued: usize,
    unchanged: Vec<String>,
    updated: Vec<String>,
    skipped: Vec<String>,
    failed: Vec<String>,
    error: Option<String>,
}

fn resolve(root: &Path, args: ResolveArgs) -> Result<i32> {
    let session = Session::open(root)?;
    let ctx = session.context(Arc::new(InMemoryJavaModel::new()));
    let scheduler = Scheduler::new(SchedulerConfig::default()).context("failed to start scheduler")?;
    let manager = ContainerManager::from_config(
        ctx,
        &session.config.container,
        &session.root,
        scheduler,
        WorkspaceLock::new(),
    );

    let queued = manager.request_all();
    let out = match manager.run(&CancellationToken::new()) {
        Ok(report) => ResolveOutput {
            queued,
            unchanged: report.unchanged,
            updated: report.updated,
            skipped: report.skipped,
            failed: Vec::new(),
            error: None,
        },
        Err(err @ (ContainerError::Project { .. } | ContainerError::Multiple(_))) => ResolveOutput {
            queued,
            unchanged: Vec::new(),
            updated: Vec::new(),
            skipped: Vec::new(),
            failed: err.failed_projects().into_iter().map(str::to_string).collect(),
            error: Some(format!("{err:#}")),
        },
        Err(err) => return Err(err).context("container pass failed"),
    };

    if args.json {
        print_json(&out)?;
    } else {
        println!("queued: {}", out.queued);
        for (label, projects) in [
            ("updated", &out.updated),
            ("unchanged", &out.unchanged),
            ("skipped", &out.skipped),
            ("failed", &out.failed),
        ] {
            if !projects.is_empty() {
                println!("{label}: {}", projects.join(", "));
            }
        }
        if let Some(error) = &out.error {
            println!("error: {error}");
        }
    }
    Ok(if out.failed.is_empty() { 0 } else { 1 })
}

fn load_target(root: &Path, args: LoadTargetArgs) -> Result<i32> {
    let session = Session::open(root)?;
    let target = TargetDefinition::load(&args.file)
        .with_context(|| format!("failed to load target {}", args.file.display()))?;
    let mut prefs = session.preferences()?;
    let report = session
        .target_operation()
        .run(&target, &mut prefs)
        .context("failed to load target")?;
    prefs
        .save(&session.preferences_path())
        .context("failed to save target preferences")?;

    if args.json {
        print_json(&report)?;
    } else {
        print_target_report(&report);
    }
    Ok(if report.is_complete() { 0 } else { 1 })
}

fn print_target_report(report: &LoadTargetReport) {
    println!("target: {}", report.platform_path);
    for location in &report.additional_locations {
        println!("  additional: {location}");
    }
    println!("  reloaded: {}", report.reloaded);
    println!("  enabled: {}", report.enabled);
    println!("  changed: {}", report.changed.len());
    if !report.missing_features.is_empty() {
        println!("  missing features: {}", report.missing_features.join(", "));
    }
    if !report.missing_plugins.is_empty() {
        println!("  missing plug-ins: {}", report.missing_plugins.join(", "));
    }
}

#[derive(Serialize)]
struct MatchOutput {
    matches: bool,
    rule: MatchRule,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}
