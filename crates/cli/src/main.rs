use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use remapper_core::{Backend, Config, EventBus, ExportKind, LookupEvent};
use remapper_lookup::output;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, trace, Level};

fn cli() -> Command {
    Command::new("remapper")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Recover obfuscated IL2CPP type and field names from a clean build")
        .arg(
            Arg::new("obfuscated")
                .help("Reflection model of the obfuscated application")
                .value_name("OBFUSCATED_MODEL")
                .index(1),
        )
        .arg(
            Arg::new("clean")
                .help("Reflection model (IL2CPP) or decompiled assembly (Mono) of the clean application")
                .value_name("CLEAN_MODEL")
                .index(2),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Load settings from a JSON configuration file")
                .value_name("CONFIG"),
        )
        .arg(
            Arg::new("pattern")
                .short('p')
                .long("pattern")
                .help("Regex matching the obfuscator's generated names")
                .value_name("REGEX"),
        )
        .arg(
            Arg::new("backend")
                .short('b')
                .long("backend")
                .help("Scripting backend of the clean build")
                .long_help(
                    "Scripting backend of the clean build.\n\
                     il2cpp: the clean model is another IL2CPP build, field offsets are compared\n\
                     mono: the clean model is a decompiled Assembly-CSharp.dll",
                )
                .value_parser(["il2cpp", "mono"])
                .value_name("BACKEND"),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .help("Additional namespace prefix to leave out of matching")
                .action(ArgAction::Append)
                .value_name("NAMESPACE"),
        )
        .arg(
            Arg::new("marker")
                .long("marker")
                .help("Namespace that marks a build as obfuscated")
                .value_name("NAMESPACE"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Write the renamed obfuscated model to this path")
                .value_name("OUTPUT_PATH"),
        )
        .arg(
            Arg::new("export")
                .short('e')
                .long("export")
                .help("Export format for the recovered names")
                .value_parser(["none", "plain", "json", "classes"])
                .value_name("FORMAT"),
        )
        .arg(
            Arg::new("export-dir")
                .short('d')
                .long("export-dir")
                .help("Directory export files are written to")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("plugin-name")
                .long("plugin-name")
                .help("Plugin name written into generated class stubs")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("save-config")
                .long("save-config")
                .help("Save the effective configuration to a JSON file")
                .value_name("CONFIG"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .long_help(
                    "Increase verbosity level. Use multiple times for more detailed output:\n\
                     -v: Show every match\n\
                     -vv: Show loading progress",
                )
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress non-error output")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
}

fn init_logging(matches: &ArgMatches) {
    let level = if matches.get_flag("quiet") {
        Level::ERROR
    } else {
        match matches.get_count("verbose") {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .init();
}

/// Start from the config file, if any, then apply command line overrides
fn build_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load(&PathBuf::from(path))
            .with_context(|| format!("Failed to load configuration {}", path))?,
        None => Config::default(),
    };

    if let Some(path) = matches.get_one::<String>("obfuscated") {
        config.obfuscated_model = PathBuf::from(path);
    }
    if let Some(path) = matches.get_one::<String>("clean") {
        config.clean_model = PathBuf::from(path);
    }
    if let Some(pattern) = matches.get_one::<String>("pattern") {
        config.naming_pattern = pattern.clone();
    }
    if let Some(backend) = matches.get_one::<String>("backend") {
        config.backend = backend.parse::<Backend>()?;
    }
    if let Some(namespaces) = matches.get_many::<String>("exclude") {
        config.excluded_namespaces.extend(namespaces.cloned());
    }
    if let Some(marker) = matches.get_one::<String>("marker") {
        config.obfuscation_marker = marker.clone();
    }
    if let Some(path) = matches.get_one::<String>("output") {
        config.renamed_output = Some(PathBuf::from(path));
    }
    if let Some(kind) = matches.get_one::<String>("export") {
        config.export.kind = kind.parse::<ExportKind>()?;
    }
    if let Some(dir) = matches.get_one::<String>("export-dir") {
        config.export.directory = Some(PathBuf::from(dir));
    }
    if let Some(name) = matches.get_one::<String>("plugin-name") {
        config.export.plugin_name = name.clone();
    }

    Ok(config)
}

fn event_logger() -> EventBus {
    let mut bus = EventBus::new();
    bus.subscribe(|event| match event {
        LookupEvent::Status(message) => info!("{}", message),
        LookupEvent::TypeMatched { .. } | LookupEvent::FieldsTranslated { .. } => {
            debug!("{}", event)
        }
        LookupEvent::GraphLoading { .. } | LookupEvent::ExportProgress { .. } => {
            trace!("{}", event)
        }
    });
    bus
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(&matches);

    let config = build_config(&matches)?;
    if let Some(path) = matches.get_one::<String>("save-config") {
        config
            .save(&PathBuf::from(path))
            .with_context(|| format!("Failed to save configuration {}", path))?;
    }
    config.validate().context("Invalid configuration")?;
    let pattern = config.naming_pattern()?;

    info!("Obfuscated model: {}", config.obfuscated_model.display());
    info!("Clean model: {} ({})", config.clean_model.display(), config.backend);

    let events = Arc::new(event_logger());
    let run = remapper_lookup::deobfuscate(&config, Some(&*events)).context("Deobfuscation failed")?;

    let stats = &run.result.report.statistics;
    info!(
        "Matched {}/{} types, renamed {} types and {} fields",
        stats.types_matched, stats.clean_types, stats.types_renamed, stats.fields_renamed
    );

    if let Some(path) = &config.renamed_output {
        run.model
            .save(path)
            .with_context(|| format!("Failed to save renamed model {}", path.display()))?;
        info!("Renamed model written to {}", path.display());
    }

    if config.export.kind != ExportKind::None {
        let export_config = config.export.clone();
        let bus = Arc::clone(&events);
        let written = tokio::task::spawn_blocking(move || {
            output::export(
                &export_config,
                &pattern,
                &run.result.graph,
                &run.result.translations,
                Some(&*bus),
            )
        })
        .await
        .context("Export task panicked")?
        .context("Export failed")?;
        info!("Export finished, {} file(s) written", written.len());
    }

    Ok(())
}
