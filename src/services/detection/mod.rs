// Detection Module
// Authenticity detectors, each a pure function of text plus shared context:
// - context: compiled, immutable scoring configuration
// - language: function-word language identification
// - translation_artifacts: reduplication, connector overuse, repeated openings
// - telltale: instant-fail machine phrases
// - structural: sentence/paragraph rhythm
// - statistical: hedging, transitions, passive voice, contractions, vocabulary
// - grammar: subject-verb agreement
// - linguistic: country voice signatures
// - compliance: persona forbidden phrases, pattern families and markers
// - aggregation: weighted score and recommendation

pub mod context;
pub mod language;
pub mod translation_artifacts;
pub mod telltale;
pub mod structural;
pub mod statistical;
pub mod grammar;
pub mod linguistic;
pub mod compliance;
pub mod aggregation;

pub use context::{CompiledFamily, ScoringContext};
pub use language::{detect_language, non_ascii_ratio};
pub use translation_artifacts::detect_translation_artifacts;
pub use telltale::detect_telltale_phrases;
pub use structural::analyze_structure;
pub use statistical::analyze_statistics;
pub use grammar::check_grammar;
pub use linguistic::{analyze_linguistic_patterns, quality_from_counts};
pub use compliance::{
    check_forbidden_phrases,
    check_pattern_compliance,
    count_markers,
    MarkerTally,
    MIN_PATTERN_FAMILIES,
};
pub use aggregation::{aggregate, classify, needs_translation, DetectionBundle, PersonaResults};
