// Enhancement Controller
// validate -> skip | translate | reprocess | enhance, with bounded retries and
// an anti-regression rule: a candidate only replaces the text when it clears
// the accept bar with more persona markers than before

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::config_store::ConfigError;
use super::detection::{count_markers, MarkerTally};
use super::personas::{AuthorProfile, EXEMPT_FORBIDDEN_CATEGORY};
use super::providers::{GenerationOptions, TextGenerator};
use super::quality_gate::QualityGate;
use super::text_processor::normalize_punctuation;
use crate::models::{
    ComponentType, EnhancementAttempt, EnhancementOutcome, EnhancementPath, QualityReport,
    Recommendation,
};

const MAX_FAILURE_REASONS: usize = 3;

#[derive(Error, Debug)]
pub enum EnhancementError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("translation failed: {reason}")]
    TranslationFailed { reason: String },
}

#[derive(Debug, Clone)]
pub struct EnhancementOptions {
    pub max_attempts: usize,
    /// Minimum distinct signature markers requested from the generator.
    pub min_markers: usize,
    /// Upper bound on total markers in an accepted candidate.
    pub max_markers: usize,
    pub component_type: ComponentType,
    pub generation: GenerationOptions,
}

impl Default for EnhancementOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_markers: 2,
            max_markers: 6,
            component_type: ComponentType::General,
            generation: GenerationOptions::default(),
        }
    }
}

const TRANSLATE_INSTRUCTIONS: &str = "Rewrite the following text in natural, fluent English. \
Keep every fact, number and technical term. Do not add commentary. \
Return only the English text.";

fn translation_prompt(text: &str) -> String {
    format!("{}\n\nText:\n{}", TRANSLATE_INSTRUCTIONS, text)
}

fn enhancement_prompt(
    path: EnhancementPath,
    text: &str,
    profile: &AuthorProfile,
    options: &EnhancementOptions,
    failures: &[String],
) -> String {
    let mut prompt = String::new();
    match path {
        EnhancementPath::Reprocess => prompt.push_str(&format!(
            "Write this text again from scratch in the voice of {} ({}). Keep the facts.\n",
            profile.name, profile.country
        )),
        _ => prompt.push_str(&format!(
            "Revise this text so it reads in the voice of {} ({}). Keep the facts and most of the wording.\n",
            profile.name, profile.country
        )),
    }

    prompt.push_str(&format!(
        "\nSignature phrases: {}\n",
        profile
            .signature_phrases
            .iter()
            .map(|p| format!("\"{}\"", p))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    prompt.push_str(&format!(
        "Use at least {} different signature phrases. Never use the same phrase twice. \
         Use no more than {} in total.\n",
        options.min_markers, options.max_markers
    ));

    let forbidden: Vec<&str> = profile
        .forbidden_phrases
        .iter()
        .filter(|(category, _)| category.as_str() != EXEMPT_FORBIDDEN_CATEGORY)
        .flat_map(|(_, phrases)| phrases.iter().map(|p| p.as_str()))
        .collect();
    if !forbidden.is_empty() {
        prompt.push_str(&format!("Never use: {}\n", forbidden.join(", ")));
    }

    if !failures.is_empty() {
        prompt.push_str("\nThe previous attempt was rejected:\n");
        for reason in failures.iter().take(MAX_FAILURE_REASONS) {
            prompt.push_str(&format!("- {}\n", reason));
        }
    }

    prompt.push_str("\nReturn only the rewritten text.\n\nText:\n");
    prompt.push_str(text);
    prompt
}

/// Why a candidate cannot replace the current text, if it cannot.
pub fn rejection_reason(
    report: &QualityReport,
    markers: &MarkerTally,
    baseline_markers: usize,
    options: &EnhancementOptions,
) -> Option<String> {
    if !report.accepted {
        return Some(format!(
            "score {:.2} is below the accept threshold ({})",
            report.overall_score,
            report.recommendation.as_str()
        ));
    }
    if markers.total <= baseline_markers {
        return Some(format!(
            "marker count {} does not exceed the original {}",
            markers.total, baseline_markers
        ));
    }
    if let Some((marker, n)) = markers.repeated().first() {
        return Some(format!("marker \"{}\" repeated {} times", marker, n));
    }
    if markers.total > options.max_markers {
        return Some(format!(
            "marker count {} exceeds the limit of {}",
            markers.total, options.max_markers
        ));
    }
    None
}

/// Reasons fed back into the next prompt: the rejection first, then top issues.
fn failure_reasons(rejection: &str, report: &QualityReport) -> Vec<String> {
    std::iter::once(rejection.to_string())
        .chain(report.issues.iter().map(|i| i.message.clone()))
        .take(MAX_FAILURE_REASONS)
        .collect()
}

pub struct EnhancementController<'a> {
    gate: &'a QualityGate,
    generator: &'a dyn TextGenerator,
}

impl<'a> EnhancementController<'a> {
    pub fn new(gate: &'a QualityGate, generator: &'a dyn TextGenerator) -> Self {
        Self { gate, generator }
    }

    /// Returns the improved text, or the original when no candidate qualifies.
    pub async fn enhance(
        &self,
        text: &str,
        author: &str,
        options: &EnhancementOptions,
    ) -> Result<String, EnhancementError> {
        Ok(self.enhance_detailed(text, author, options).await?.text)
    }

    pub async fn enhance_detailed(
        &self,
        text: &str,
        author: &str,
        options: &EnhancementOptions,
    ) -> Result<EnhancementOutcome, EnhancementError> {
        let run_id = Uuid::new_v4();
        let profile = self.gate.profile(author)?;
        let component = Some(options.component_type);

        let mut current_text = text.to_string();
        let mut current = self.gate.analyze(text, Some(author), component).await?;
        info!(
            %run_id,
            author,
            score = current.overall_score,
            recommendation = current.recommendation.as_str(),
            "[ENHANCE] validated input"
        );

        if current.recommendation == Recommendation::Accept {
            return Ok(EnhancementOutcome {
                text: current_text,
                report: current,
                path: EnhancementPath::Skip,
                improved: false,
                attempts: Vec::new(),
            });
        }

        let mut attempts = Vec::new();
        let mut path = None;

        if current.recommendation == Recommendation::Translate {
            path = Some(EnhancementPath::Translate);
            let outcome = self
                .generator
                .generate(&translation_prompt(&current_text), &options.generation)
                .await;
            if !outcome.success {
                let reason = outcome
                    .error
                    .unwrap_or_else(|| "generator reported failure".to_string());
                warn!(%run_id, %reason, "[ENHANCE] translation call failed");
                return Err(EnhancementError::TranslationFailed { reason });
            }
            let translated = outcome.content.trim().to_string();
            let report = self.gate.analyze(&translated, Some(author), component).await?;
            if translated.is_empty()
                || !report.language.language.is_english()
                || report.recommendation == Recommendation::Translate
            {
                let reason = format!(
                    "output still reads as {} (confidence {:.2})",
                    report.language.language.as_str(),
                    report.language.confidence
                );
                warn!(%run_id, %reason, "[ENHANCE] translation rejected");
                return Err(EnhancementError::TranslationFailed { reason });
            }
            info!(
                %run_id,
                score = report.overall_score,
                "[ENHANCE] translated to English"
            );
            attempts.push(EnhancementAttempt {
                index: 0,
                candidate: translated.clone(),
                report: report.clone(),
                accepted: true,
                rejection_reason: None,
            });
            current_text = translated;
            current = report;

            if current.recommendation == Recommendation::Accept {
                return Ok(EnhancementOutcome {
                    text: current_text,
                    report: current,
                    path: EnhancementPath::Translate,
                    improved: true,
                    attempts,
                });
            }
        }

        let loop_path = if current.recommendation == Recommendation::Regenerate {
            EnhancementPath::Reprocess
        } else {
            EnhancementPath::Enhance
        };
        let path = path.unwrap_or(loop_path);
        let baseline_markers = current.marker_count;
        let mut failures: Vec<String> = current
            .issues
            .iter()
            .take(MAX_FAILURE_REASONS)
            .map(|i| i.message.clone())
            .collect();

        for index in 1..=options.max_attempts {
            let prompt = enhancement_prompt(loop_path, &current_text, &profile, options, &failures);
            let outcome = self.generator.generate(&prompt, &options.generation).await;
            if !outcome.success || outcome.content.trim().is_empty() {
                warn!(
                    %run_id,
                    attempt = index,
                    error = outcome.error.as_deref().unwrap_or("empty output"),
                    "[ENHANCE] generation failed, keeping original"
                );
                break;
            }

            let candidate = outcome.content.trim().to_string();
            let report = self.gate.analyze(&candidate, Some(author), component).await?;
            let markers = count_markers(&normalize_punctuation(&candidate), &profile);

            match rejection_reason(&report, &markers, baseline_markers, options) {
                None => {
                    info!(
                        %run_id,
                        attempt = index,
                        score = report.overall_score,
                        markers = markers.total,
                        "[ENHANCE] candidate accepted"
                    );
                    attempts.push(EnhancementAttempt {
                        index,
                        candidate: candidate.clone(),
                        report: report.clone(),
                        accepted: true,
                        rejection_reason: None,
                    });
                    return Ok(EnhancementOutcome {
                        text: candidate,
                        report,
                        path,
                        improved: true,
                        attempts,
                    });
                }
                Some(reason) => {
                    info!(%run_id, attempt = index, %reason, "[ENHANCE] candidate rejected");
                    failures = failure_reasons(&reason, &report);
                    attempts.push(EnhancementAttempt {
                        index,
                        candidate,
                        report,
                        accepted: false,
                        rejection_reason: Some(reason),
                    });
                }
            }
        }

        info!(
            %run_id,
            attempts = attempts.len(),
            "[ENHANCE] no candidate qualified, returning current text"
        );
        Ok(EnhancementOutcome {
            improved: current_text != text,
            text: current_text,
            report: current,
            path,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::GenerationOutcome;
    use crate::services::quality_gate::test_support::{gate, ON_VOICE_TEXT};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const INDONESIAN_TEXT: &str =
        "Proses ini sangat efektif untuk membersihkan permukaan logam dengan cepat dan aman.";

    /// Hedged, uniform and marker-free: lands in revise.
    const REVISE_TEXT: &str =
        "The laser might clean the gate. The laser might clean the fence. The laser might clean the rail.";

    struct ScriptedGenerator {
        replies: Mutex<VecDeque<GenerationOutcome>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<GenerationOutcome>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn prompt(&self, i: usize) -> String {
            self.prompts.lock().unwrap()[i].clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> GenerationOutcome {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| GenerationOutcome::failed("script exhausted"))
        }
    }

    #[tokio::test]
    async fn test_revise_text_baseline() {
        let report = gate().score(REVISE_TEXT, Some("yi_chen")).await.unwrap();
        assert_eq!(report.recommendation, Recommendation::Revise);
        assert_eq!(report.marker_count, 0);
    }

    #[tokio::test]
    async fn test_accepted_text_skips_generation() {
        let g = gate();
        let generator = ScriptedGenerator::new(vec![]);
        let controller = EnhancementController::new(&g, &generator);
        let outcome = controller
            .enhance_detailed(ON_VOICE_TEXT, "yi_chen", &EnhancementOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.path, EnhancementPath::Skip);
        assert_eq!(outcome.text, ON_VOICE_TEXT);
        assert!(!outcome.improved);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_enhance_accepts_qualifying_candidate() {
        let g = gate();
        let generator = ScriptedGenerator::new(vec![GenerationOutcome::ok(ON_VOICE_TEXT)]);
        let controller = EnhancementController::new(&g, &generator);
        let outcome = controller
            .enhance_detailed(REVISE_TEXT, "yi_chen", &EnhancementOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.path, EnhancementPath::Enhance);
        assert!(outcome.improved);
        assert_eq!(outcome.text, ON_VOICE_TEXT);
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(generator.calls(), 1);

        let prompt = generator.prompt(0);
        assert!(prompt.contains("\"in practice\""));
        assert!(prompt.contains("breathtaking"));
        assert!(!prompt.contains("you will"));

        // Accepted output stays accepted when scored again.
        let again = g.score(&outcome.text, Some("yi_chen")).await.unwrap();
        assert_eq!(again.recommendation, Recommendation::Accept);
    }

    #[tokio::test]
    async fn test_markers_counted_on_normalized_candidate() {
        let g = gate();
        let candidate = ON_VOICE_TEXT
            .replace("In practice", "In\u{00A0}practice")
            .replace("We can see", "We\u{3000}can see");
        assert_eq!(count_markers(&candidate, &g.profile("yi_chen").unwrap()).total, 0);

        let generator = ScriptedGenerator::new(vec![GenerationOutcome::ok(candidate.clone())]);
        let controller = EnhancementController::new(&g, &generator);
        let outcome = controller
            .enhance_detailed(REVISE_TEXT, "yi_chen", &EnhancementOptions::default())
            .await
            .unwrap();
        assert!(outcome.improved);
        assert_eq!(outcome.text, candidate);
        assert_eq!(outcome.report.marker_count, 2);
        assert!(outcome.attempts[0].accepted);
    }

    #[tokio::test]
    async fn test_rejected_candidates_keep_original() {
        let g = gate();
        let repeated = format!("{} In practice it held up.", ON_VOICE_TEXT);
        let generator = ScriptedGenerator::new(vec![
            GenerationOutcome::ok("Let us delve into the cleaning of this gate."),
            GenerationOutcome::ok(repeated),
            GenerationOutcome::failed("rate limited"),
        ]);
        let controller = EnhancementController::new(&g, &generator);
        let outcome = controller
            .enhance_detailed(REVISE_TEXT, "yi_chen", &EnhancementOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.text, REVISE_TEXT);
        assert!(!outcome.improved);
        assert_eq!(outcome.report.recommendation, Recommendation::Revise);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(outcome.attempts.iter().all(|a| !a.accepted));
        assert!(outcome.attempts[1]
            .rejection_reason
            .as_deref()
            .unwrap()
            .contains("repeated"));
        assert_eq!(generator.calls(), 3);
        // Second prompt carries the first rejection back to the generator.
        assert!(generator.prompt(1).contains("delve into"));
    }

    #[tokio::test]
    async fn test_translation_path() {
        let g = gate();
        let generator = ScriptedGenerator::new(vec![GenerationOutcome::ok(ON_VOICE_TEXT)]);
        let controller = EnhancementController::new(&g, &generator);
        let outcome = controller
            .enhance_detailed(INDONESIAN_TEXT, "yi_chen", &EnhancementOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.path, EnhancementPath::Translate);
        assert_eq!(outcome.text, ON_VOICE_TEXT);
        assert!(generator.prompt(0).contains("English"));
    }

    #[tokio::test]
    async fn test_translation_continues_into_enhance_loop() {
        let g = gate();
        let generator = ScriptedGenerator::new(vec![
            GenerationOutcome::ok(REVISE_TEXT),
            GenerationOutcome::ok(ON_VOICE_TEXT),
        ]);
        let controller = EnhancementController::new(&g, &generator);
        let outcome = controller
            .enhance_detailed(INDONESIAN_TEXT, "yi_chen", &EnhancementOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.path, EnhancementPath::Translate);
        assert_eq!(outcome.text, ON_VOICE_TEXT);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(generator.prompt(1).contains(REVISE_TEXT));
    }

    #[tokio::test]
    async fn test_translation_failure_is_fatal() {
        let g = gate();
        let generator = ScriptedGenerator::new(vec![GenerationOutcome::ok(INDONESIAN_TEXT)]);
        let controller = EnhancementController::new(&g, &generator);
        let err = controller
            .enhance(INDONESIAN_TEXT, "yi_chen", &EnhancementOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EnhancementError::TranslationFailed { .. }));

        let generator = ScriptedGenerator::new(vec![GenerationOutcome::failed("timeout")]);
        let controller = EnhancementController::new(&g, &generator);
        let err = controller
            .enhance(INDONESIAN_TEXT, "yi_chen", &EnhancementOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "translation failed: timeout");
    }

    #[tokio::test]
    async fn test_unknown_author_is_config_error() {
        let g = gate();
        let generator = ScriptedGenerator::new(vec![]);
        let controller = EnhancementController::new(&g, &generator);
        let err = controller
            .enhance("Some text.", "nobody", &EnhancementOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EnhancementError::Config(ConfigError::UnknownPersona(_))));
    }

    #[test]
    fn test_rejection_reason_marker_bounds() {
        let g = gate();
        let report = g.analyze_offline(ON_VOICE_TEXT, Some("yi_chen"), None).unwrap();
        let options = EnhancementOptions {
            max_markers: 1,
            ..EnhancementOptions::default()
        };
        let mut tally = MarkerTally::default();
        tally.total = 2;
        tally.per_marker.insert("in practice".to_string(), 1);
        tally.per_marker.insert("we can see".to_string(), 1);

        assert!(rejection_reason(&report, &tally, 2, &options)
            .unwrap()
            .contains("does not exceed"));
        assert!(rejection_reason(&report, &tally, 0, &options)
            .unwrap()
            .contains("exceeds the limit"));
        assert!(rejection_reason(&report, &tally, 0, &EnhancementOptions::default()).is_none());
    }
}
