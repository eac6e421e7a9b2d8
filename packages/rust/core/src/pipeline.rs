//! End-to-end event pipeline: name → profile → tags → rules + history → risk → page.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use eventintel_knowledge::DocumentSearch;
use eventintel_llm::GenerationService;
use eventintel_shared::{AppConfig, EventIntelError, Result};

use crate::stages;
use crate::state::{FinalState, PipelineState, Stage};

const GENERATION: &str = "generation";
const KNOWLEDGE: &str = "knowledge store";

/// Tunables the orchestrator needs from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub rules_k: usize,
    pub history_k: usize,
    pub creative_temperature: f32,
    /// Upper bound for each external call.
    pub call_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            rules_k: config.knowledge.rules_k,
            history_k: config.knowledge.history_k,
            creative_temperature: config.generation.creative_temperature,
            call_timeout: Duration::from_secs(config.pipeline.call_timeout_secs),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a stage runs.
    fn stage_started(&self, stage: Stage);
    /// Called after a stage's output has been recorded.
    fn stage_finished(&self, stage: Stage, elapsed: Duration);
    /// Called when the run completes.
    fn done(&self, result: &FinalState);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {}
    fn done(&self, _result: &FinalState) {}
}

/// The five-stage event pipeline.
///
/// Collaborators are shared behind `Arc`; each [`Pipeline::run`] owns its
/// own state, so concurrent runs never see each other's data.
pub struct Pipeline<G, S> {
    generator: Arc<G>,
    search: Arc<S>,
    settings: PipelineSettings,
}

impl<G: GenerationService, S: DocumentSearch> Pipeline<G, S> {
    pub fn new(generator: Arc<G>, search: Arc<S>, settings: PipelineSettings) -> Self {
        Self {
            generator,
            search,
            settings,
        }
    }

    /// Run every stage in order for one event name.
    ///
    /// 1. Inference: expand the name into a profile
    /// 2. Classification: derive risk tags
    /// 3. Retrieval: rules and history for the tags
    /// 4. Risk: score and mitigation
    /// 5. Marketing: landing page
    #[instrument(skip_all, fields(event = %event_name.trim()))]
    pub async fn run(
        &self,
        event_name: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<FinalState> {
        let start = Instant::now();
        let state = PipelineState::new(event_name)?;
        info!(run_id = %state.run_id(), "starting event pipeline");

        let generator = self.generator.as_ref();
        let search = self.search.as_ref();

        // --- Stage 1: Inference ---
        progress.stage_started(Stage::Inference);
        let t = Instant::now();
        let details = self
            .bounded(GENERATION, stages::infer_event(generator, &state))
            .await?;
        let state = state.with_event_details(details)?;
        progress.stage_finished(Stage::Inference, t.elapsed());

        // --- Stage 2: Classification ---
        progress.stage_started(Stage::Classification);
        let t = Instant::now();
        let classification = self
            .bounded(GENERATION, stages::classify_event(generator, &state))
            .await?;
        let state = state.with_classification(classification)?;
        progress.stage_finished(Stage::Classification, t.elapsed());

        // --- Stage 3: Retrieval ---
        progress.stage_started(Stage::Retrieval);
        let t = Instant::now();
        let retrieval = self
            .bounded(
                KNOWLEDGE,
                stages::retrieve_context(
                    search,
                    &state,
                    self.settings.rules_k,
                    self.settings.history_k,
                ),
            )
            .await?;
        let state = state.with_retrieval(retrieval)?;
        progress.stage_finished(Stage::Retrieval, t.elapsed());

        // --- Stage 4: Risk ---
        progress.stage_started(Stage::Risk);
        let t = Instant::now();
        let assessment = self
            .bounded(GENERATION, stages::analyze_risk(generator, &state))
            .await?;
        let state = state.with_risk_assessment(assessment)?;
        progress.stage_finished(Stage::Risk, t.elapsed());

        // --- Stage 5: Marketing ---
        progress.stage_started(Stage::Marketing);
        let t = Instant::now();
        let page = self
            .bounded(
                GENERATION,
                stages::generate_marketing(
                    generator,
                    &state,
                    self.settings.creative_temperature,
                ),
            )
            .await?;
        let state = state.with_marketing_code(page)?;
        progress.stage_finished(Stage::Marketing, t.elapsed());

        let result = state.finish()?;
        progress.done(&result);

        info!(
            run_id = %result.run_id,
            score = ?result.risk_assessment.score,
            degraded = ?result.degraded_stages(),
            elapsed_ms = start.elapsed().as_millis(),
            "event pipeline complete"
        );

        Ok(result)
    }

    /// Await `fut`, failing with [`EventIntelError::Timeout`] past the call budget.
    async fn bounded<T>(
        &self,
        service: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let limit = self.settings.call_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(EventIntelError::Timeout {
                service,
                secs: limit.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RiskLevel;
    use crate::testing::{ScriptedGenerator, StaticSearch};
    use std::sync::Mutex;

    fn pipeline(
        generator: ScriptedGenerator,
        search: StaticSearch,
    ) -> Pipeline<ScriptedGenerator, StaticSearch> {
        Pipeline::new(Arc::new(generator), Arc::new(search), PipelineSettings::default())
    }

    /// Records the progress callbacks in order.
    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn stage_started(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start:{stage}"));
        }
        fn stage_finished(&self, stage: Stage, _elapsed: Duration) {
            self.events.lock().unwrap().push(format!("finish:{stage}"));
        }
        fn done(&self, _result: &FinalState) {
            self.events.lock().unwrap().push("done".into());
        }
    }

    #[tokio::test]
    async fn rooftop_fundraiser_end_to_end() {
        let p = pipeline(ScriptedGenerator::jazz_fundraiser(), StaticSearch::seeded());
        let result = p
            .run("Midnight Rooftop Jazz Charity Fundraiser", &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.event_name, "Midnight Rooftop Jazz Charity Fundraiser");
        assert_eq!(result.event_details.estimated_attendees(), Some(150));
        assert_eq!(result.search_queries.len(), 4);
        assert_eq!(result.knowledge_docs.len(), 4);
        assert_eq!(result.past_memories.len(), 3);
        assert!(result.knowledge_docs.iter().all(|d| d.starts_with("[RULE SOURCE: ")));
        assert!(result.past_memories.iter().all(|d| d.starts_with("[HISTORY LOG: ")));

        let risk = &result.risk_assessment;
        assert_eq!(risk.score, Some(78));
        assert_eq!(risk.level, Some(RiskLevel::High));
        assert!(risk.reasoning.contains("SOP-102"));

        assert!(result.marketing_code.starts_with("<!DOCTYPE html>"));
        assert!(result.marketing_code.ends_with("</html>"));
        assert!(result.marketing_code.contains("EVENT.AI"));
        assert!(!result.marketing_code.contains("```"));
        assert!(result.degraded_stages().is_empty());
    }

    #[tokio::test]
    async fn stages_run_in_order() {
        let generator = Arc::new(ScriptedGenerator::jazz_fundraiser());
        let p = Pipeline::new(
            generator.clone(),
            Arc::new(StaticSearch::seeded()),
            PipelineSettings::default(),
        );
        let progress = RecordingProgress::default();
        p.run("Spring Fling", &progress).await.unwrap();

        let events = progress.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start:inference",
                "finish:inference",
                "start:classification",
                "finish:classification",
                "start:retrieval",
                "finish:retrieval",
                "start:risk",
                "finish:risk",
                "start:marketing",
                "finish:marketing",
                "done",
            ]
        );

        let calls = generator.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[..3].iter().all(|c| c.sampling.is_deterministic()));
        assert!(!calls[3].sampling.is_deterministic());
    }

    #[tokio::test]
    async fn blank_name_is_rejected_before_any_call() {
        let generator = Arc::new(ScriptedGenerator::jazz_fundraiser());
        let search = Arc::new(StaticSearch::seeded());
        let p = Pipeline::new(generator.clone(), search.clone(), PipelineSettings::default());

        let err = p.run("   ", &SilentProgress).await.unwrap_err();
        assert!(matches!(err, EventIntelError::Validation { .. }));
        assert!(generator.calls().is_empty());
        assert_eq!(search.query_count(), 0);
    }

    #[tokio::test]
    async fn degraded_outputs_do_not_abort_the_run() {
        let generator = ScriptedGenerator::new()
            .inference("I am not sure what this event is.")
            .classification("nope")
            .risk("Risk is probably fine")
            .marketing("<section>Welcome</section>");
        let search = Arc::new(StaticSearch::seeded());
        let p = Pipeline::new(Arc::new(generator), search.clone(), PipelineSettings::default());

        let result = p.run("???", &SilentProgress).await.unwrap();
        assert!(result.event_details.is_degraded());
        assert!(result.search_queries.is_empty());
        assert!(result.knowledge_docs.is_empty());
        assert!(result.past_memories.is_empty());
        assert_eq!(search.query_count(), 0);
        assert_eq!(result.risk_assessment.score, None);
        assert!(result.marketing_code.contains("<section>Welcome</section>"));
        assert_eq!(
            result.degraded_stages(),
            &[Stage::Inference, Stage::Classification, Stage::Risk]
        );
    }

    #[tokio::test]
    async fn generation_failure_aborts_the_run() {
        let p = pipeline(ScriptedGenerator::failing(), StaticSearch::seeded());
        let progress = RecordingProgress::default();
        let err = p.run("Quiz Night", &progress).await.unwrap_err();

        assert!(err.is_service_failure());
        let events = progress.events.lock().unwrap().clone();
        assert_eq!(events, vec!["start:inference"]);
    }

    #[tokio::test]
    async fn store_failure_aborts_the_run() {
        let p = pipeline(ScriptedGenerator::jazz_fundraiser(), StaticSearch::failing());
        let err = p.run("Quiz Night", &SilentProgress).await.unwrap_err();
        assert!(matches!(err, EventIntelError::Storage(_)));
    }

    #[tokio::test]
    async fn slow_generation_times_out() {
        let generator = ScriptedGenerator::jazz_fundraiser().delayed(Duration::from_secs(5));
        let settings = PipelineSettings {
            call_timeout: Duration::from_millis(50),
            ..PipelineSettings::default()
        };
        let p = Pipeline::new(Arc::new(generator), Arc::new(StaticSearch::seeded()), settings);

        let err = p.run("Quiz Night", &SilentProgress).await.unwrap_err();
        assert!(matches!(err, EventIntelError::Timeout { service: "generation", .. }));
    }

    #[tokio::test]
    async fn empty_store_still_completes() {
        let p = pipeline(ScriptedGenerator::jazz_fundraiser(), StaticSearch::empty());
        let result = p.run("Quiz Night", &SilentProgress).await.unwrap();
        assert!(result.knowledge_docs.is_empty());
        assert!(result.past_memories.is_empty());
        assert_eq!(result.risk_assessment.score, Some(78));
    }

    #[tokio::test]
    async fn concurrent_runs_keep_separate_state() {
        let p = Arc::new(pipeline(
            ScriptedGenerator::jazz_fundraiser(),
            StaticSearch::seeded(),
        ));
        let names = ["Spring Fling", "Quiz Night", "Charity Gala"];
        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let p = p.clone();
                let name = name.to_string();
                tokio::spawn(async move { p.run(&name, &SilentProgress).await })
            })
            .collect();

        let mut run_ids = Vec::new();
        for (handle, name) in handles.into_iter().zip(names) {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.event_name, name);
            assert!(result.marketing_code.contains(&format!("<title>{name}</title>")));
            run_ids.push(result.run_id);
        }
        run_ids.dedup();
        assert_eq!(run_ids.len(), 3);
    }

    #[test]
    fn settings_come_from_config() {
        let mut config = AppConfig::default();
        config.knowledge.rules_k = 6;
        config.pipeline.call_timeout_secs = 30;
        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.rules_k, 6);
        assert_eq!(settings.history_k, 3);
        assert_eq!(settings.call_timeout, Duration::from_secs(30));
        assert_eq!(settings.creative_temperature, 0.7);
    }
}
