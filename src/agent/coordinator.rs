// src/agent/coordinator.rs

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::agent::{Agent, Resolution};
use crate::classifier::{Classifier, KeywordClassifier};
use crate::config::{Config, LlmConfig, PlannerMode, RetryConfig, ScenarioDefaults, TimeoutConfig};
use crate::context::RuntimeContext;
use crate::error::{ConfigurationError, ResolutionError};
use crate::executor::PlanExecutor;
use crate::memory::ContextStore;
use crate::model::Scenario;
use crate::protocol::llm::LlmClient;
use crate::protocol::planner::{FixedPlanner, LlmPlanner, Planner};
use crate::tools::{Simulation, ToolRegistry, standard_catalogue};

/// Single entry point: classify, plan, execute, summarize.
///
/// `Send + Sync`; one coordinator can serve many resolutions at once, each on
/// its own thread with its own trace and context session.
pub struct Coordinator {
    classifier: Arc<dyn Classifier>,
    planner: Arc<dyn Planner>,
    executor: PlanExecutor,
    store: ContextStore,
    defaults: ScenarioDefaults,
    resolution_timeout: Duration,
}

impl Coordinator {
    /// Standard catalogue, keyword classifier and the configured planner.
    pub fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let registry = standard_catalogue(&Simulation::from_config(&config.simulation))?;
        Self::builder(registry).config(config).build()
    }

    pub fn builder(registry: ToolRegistry) -> CoordinatorBuilder {
        CoordinatorBuilder::new(registry)
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn planner_name(&self) -> &str {
        self.planner.name()
    }

    /// Resolves under a caller-supplied context, so the caller keeps the
    /// cancellation token and may set its own deadline. The configured
    /// resolution timeout still applies if it is sooner.
    pub fn resolve_with(&self, scenario_text: &str, ctx: RuntimeContext) -> Result<Resolution, ResolutionError> {
        let ctx = ctx.with_timeout(self.resolution_timeout);
        let span = info_span!("resolution", case_id = %ctx.case_id);
        let _guard = span.enter();

        let category = self.classifier.classify(scenario_text);
        info!(%category, "scenario classified");
        let scenario = Scenario::from_text(&ctx.case_id, scenario_text, category, &self.defaults);

        let session = self.store.open_session(&ctx.case_id)?;
        let plan = self
            .planner
            .plan(&scenario, self.executor.registry())
            .inspect_err(|e| warn!(error = %e, "planning failed"))?;
        info!(plan = %plan.name, planner = self.planner.name(), "plan selected");

        let outcome = self.executor.execute(&plan, &scenario, &ctx, &session)?;
        let context = session.close();
        info!(steps = outcome.trace.len(), "resolution complete");

        Ok(Resolution {
            case_id: ctx.case_id.clone(),
            input: scenario_text.to_string(),
            output: outcome.summary,
            category,
            planner: self.planner.name().to_string(),
            trace: outcome.trace,
            context,
        })
    }
}

impl Agent for Coordinator {
    fn resolve(&self, scenario_text: &str) -> Result<Resolution, ResolutionError> {
        let case_id = Uuid::new_v4().to_string();
        self.resolve_with(scenario_text, RuntimeContext::new(&case_id))
    }
}

/// Assembles a [`Coordinator`]; every part can be swapped before `build`.
pub struct CoordinatorBuilder {
    registry: ToolRegistry,
    classifier: Option<Arc<dyn Classifier>>,
    planner: Option<Arc<dyn Planner>>,
    planner_mode: PlannerMode,
    llm: LlmConfig,
    retry: RetryConfig,
    timeouts: TimeoutConfig,
    defaults: ScenarioDefaults,
    store: Option<ContextStore>,
}

impl CoordinatorBuilder {
    fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            classifier: None,
            planner: None,
            planner_mode: PlannerMode::default(),
            llm: LlmConfig::default(),
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            defaults: ScenarioDefaults::default(),
            store: None,
        }
    }

    /// Takes planner mode, retry policy, timeouts and scenario defaults
    /// from `config`.
    pub fn config(mut self, config: &Config) -> Self {
        self.planner_mode = config.planner;
        self.llm = config.llm.clone();
        self.retry = config.retry.clone();
        self.timeouts = config.timeouts.clone();
        self.defaults = config.scenario_defaults.clone();
        self
    }

    pub fn classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    pub fn planner(mut self, planner: impl Planner + 'static) -> Self {
        self.planner = Some(Arc::new(planner));
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn scenario_defaults(mut self, defaults: ScenarioDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn store(mut self, store: ContextStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Fails on invalid fixed plans or missing LLM credentials.
    pub fn build(self) -> Result<Coordinator, ConfigurationError> {
        let planner: Arc<dyn Planner> = match self.planner {
            Some(planner) => planner,
            None => match self.planner_mode {
                PlannerMode::Scripted => Arc::new(FixedPlanner::standard(&self.registry)?),
                PlannerMode::Llm => {
                    let client = LlmClient::from_config(&self.llm, |var| std::env::var(var).ok())?;
                    Arc::new(LlmPlanner::new(client))
                }
            },
        };
        let executor = PlanExecutor::new(Arc::new(self.registry))
            .with_retry(self.retry)
            .with_step_timeout(self.timeouts.step_timeout());

        Ok(Coordinator {
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(KeywordClassifier::standard())),
            planner,
            executor,
            store: self.store.unwrap_or_default(),
            defaults: self.defaults,
            resolution_timeout: self.timeouts.resolution_timeout(),
        })
    }
}
