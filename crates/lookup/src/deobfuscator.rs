//! Backend pipelines tying graph construction, matching and write-back together

use crate::graph::GraphBuilder;
use crate::resolver::{LookupModel, LookupOptions, LookupResult};
use crate::source::TypeSource;
use remapper_core::{
    AssemblyModel, Backend, Compiler, Config, Error, EventBus, GraphRole, Il2CppModel, Result,
};
use tracing::{info, warn};

/// Obfuscated model with recovered names written back, plus the run outcome
#[derive(Debug)]
pub struct Deobfuscation {
    pub model: Il2CppModel,
    pub result: LookupResult,
}

/// Runs one of the two backends against an obfuscated IL2CPP model
pub struct Deobfuscator<'a> {
    config: &'a Config,
    events: Option<&'a EventBus>,
}

impl<'a> Deobfuscator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<&'a EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Load both models named by the configuration and run the configured backend
    pub fn run(&self) -> Result<Deobfuscation> {
        self.status("Loading obfuscated application");
        let mut model = Il2CppModel::load(&self.config.obfuscated_model)?;

        let result = match self.config.backend {
            Backend::Il2Cpp => {
                self.status("Loading unobfuscated application");
                let clean = Il2CppModel::load(&self.config.clean_model)?;
                self.run_il2cpp(&mut model, &clean)?
            }
            Backend::Mono => {
                self.status("Creating model for Mono dll");
                let clean = AssemblyModel::load(&self.config.clean_model)?;
                self.run_mono(&mut model, &clean)?
            }
        };

        Ok(Deobfuscation { model, result })
    }

    /// Clean reference is another IL2CPP build of the same application
    pub fn run_il2cpp(
        &self,
        obfuscated: &mut Il2CppModel,
        clean: &Il2CppModel,
    ) -> Result<LookupResult> {
        if obfuscated.compiler.is_known()
            && clean.compiler.is_known()
            && obfuscated.compiler != clean.compiler
        {
            return Err(Error::CrossCompiler {
                obfuscated: obfuscated.compiler.to_string(),
                clean: clean.compiler.to_string(),
            });
        }

        let check_offsets = obfuscated.has_layout() && clean.has_layout();
        self.process(obfuscated, clean, check_offsets)
    }

    /// Clean reference is a decompiled managed assembly from a Mono build
    pub fn run_mono(
        &self,
        obfuscated: &mut Il2CppModel,
        clean: &AssemblyModel,
    ) -> Result<LookupResult> {
        if obfuscated.compiler.is_known() && obfuscated.compiler != Compiler::Msvc {
            return Err(Error::CrossCompiler {
                obfuscated: obfuscated.compiler.to_string(),
                clean: "Mono".to_string(),
            });
        }

        self.process(obfuscated, clean, false)
    }

    fn process<O, C>(&self, obfuscated: &mut O, clean: &C, check_offsets: bool) -> Result<LookupResult>
    where
        O: TypeSource + ?Sized,
        C: TypeSource + ?Sized,
    {
        let pattern = self.config.naming_pattern()?;
        let excluded = &self.config.excluded_namespaces;

        self.status("Creating type graph for unobfuscated application");
        let clean_graph = GraphBuilder::new(clean, GraphRole::Clean)
            .exclude_namespaces(excluded)
            .with_events(self.events)
            .build();

        self.status("Creating type graph for obfuscated application");
        let obfuscated_graph = GraphBuilder::new(&*obfuscated, GraphRole::Obfuscated)
            .exclude_namespaces(excluded)
            .with_events(self.events)
            .build();

        let options = LookupOptions::new(pattern, check_offsets)
            .with_marker(self.config.obfuscation_marker.clone());
        let model = LookupModel::new(obfuscated_graph, &clean_graph, options)?
            .with_events(self.events);

        self.status("Deobfuscating binary");
        info!(
            "Running {} backend (offsets {})",
            self.config.backend,
            if check_offsets { "checked" } else { "ignored" }
        );
        let result = model.translate_types();

        if result.translations.is_empty() {
            warn!("No type or field could be translated");
            return Err(Error::NothingTranslated);
        }

        let written = result.translations.apply_to(&result.graph, obfuscated);
        info!("Wrote {} recovered names back to the obfuscated model", written);
        Ok(result)
    }

    fn status(&self, message: &str) {
        if let Some(events) = self.events {
            events.status(message);
        }
    }
}

/// Run the backend named by `config`
pub fn deobfuscate(config: &Config, events: Option<&EventBus>) -> Result<Deobfuscation> {
    Deobfuscator::new(config).with_events(events).run()
}
