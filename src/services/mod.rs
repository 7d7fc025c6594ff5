// Authenticity Gate Core Services

pub mod text_processor;
pub mod config_store;
pub mod personas;
pub mod providers;
pub mod detection;
pub mod quality_gate;
pub mod enhancement;

pub use text_processor::*;
pub use config_store::*;
pub use personas::*;
pub use providers::*;
pub use quality_gate::QualityGate;
pub use enhancement::{EnhancementController, EnhancementError, EnhancementOptions};

pub use detection::{
    aggregate,
    classify,
    detect_language,
    DetectionBundle,
    MarkerTally,
    PersonaResults,
    ScoringContext,
};
