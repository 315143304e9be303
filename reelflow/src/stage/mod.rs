//! The fixed pipeline stage sequence and its executor.
//!
//! The sequence is a linear state machine represented as an ordered list of
//! stage descriptors, not a dynamic dispatch table: it never varies at
//! runtime. Channel behavior varies through configuration, never through
//! branching stage code.

mod collaborator;
mod executor;
mod integration_tests;

pub use collaborator::{
    Collaborator, CollaboratorError, CollaboratorRegistry, CollaboratorRequest,
    CollaboratorResponse,
};
pub use executor::{ExecutorState, StageExecutor};

use serde::Serialize;

/// How the executor drives a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    /// Generates idea candidates via parallel collaborator calls. The
    /// candidates stay in memory; only the selection stage persists output.
    IdeaGeneration,
    /// Scores and selects among the generated candidates. Internal, no
    /// collaborator.
    IdeaSelection,
    /// Invokes exactly one external collaborator with declared inputs and
    /// records declared outputs.
    Collaborate,
}

/// One ordered step of the pipeline: declared inputs and outputs plus the
/// external capability it calls.
#[derive(Debug, Clone, Copy)]
pub struct StageDescriptor {
    /// The stage name, also the artifact subdirectory name.
    pub name: &'static str,
    /// Position in the fixed sequence.
    pub ordinal: usize,
    /// Declared input artifacts as (producing stage, artifact name).
    pub inputs: &'static [(&'static str, &'static str)],
    /// Declared output artifact names, written under this stage's
    /// directory. A stage is complete only once all of them exist.
    pub outputs: &'static [&'static str],
    /// The collaborator registry key, if the stage calls one.
    pub collaborator: Option<&'static str>,
    /// How the executor drives this stage.
    pub role: StageRole,
}

/// The fixed stage sequence:
/// idea → selection → script → beats → image_prompts → images → voiceover →
/// captions → music → assembly → render.
pub const PIPELINE: &[StageDescriptor] = &[
    StageDescriptor {
        name: "idea",
        ordinal: 0,
        inputs: &[],
        outputs: &[],
        collaborator: Some("idea_generator"),
        role: StageRole::IdeaGeneration,
    },
    StageDescriptor {
        name: "selection",
        ordinal: 1,
        inputs: &[],
        outputs: &["selected_idea"],
        collaborator: None,
        role: StageRole::IdeaSelection,
    },
    StageDescriptor {
        name: "script",
        ordinal: 2,
        inputs: &[("selection", "selected_idea")],
        outputs: &["script"],
        collaborator: Some("scriptwriter"),
        role: StageRole::Collaborate,
    },
    StageDescriptor {
        name: "beats",
        ordinal: 3,
        inputs: &[("script", "script")],
        outputs: &["beats"],
        collaborator: Some("beat_planner"),
        role: StageRole::Collaborate,
    },
    StageDescriptor {
        name: "image_prompts",
        ordinal: 4,
        inputs: &[("beats", "beats")],
        outputs: &["image_prompts"],
        collaborator: Some("image_prompt_planner"),
        role: StageRole::Collaborate,
    },
    StageDescriptor {
        name: "images",
        ordinal: 5,
        inputs: &[("image_prompts", "image_prompts")],
        outputs: &["images"],
        collaborator: Some("image_generator"),
        role: StageRole::Collaborate,
    },
    StageDescriptor {
        name: "voiceover",
        ordinal: 6,
        inputs: &[("script", "script")],
        outputs: &["voiceover"],
        collaborator: Some("voice_generator"),
        role: StageRole::Collaborate,
    },
    StageDescriptor {
        name: "captions",
        ordinal: 7,
        inputs: &[("script", "script"), ("voiceover", "voiceover")],
        outputs: &["captions"],
        collaborator: Some("caption_aligner"),
        role: StageRole::Collaborate,
    },
    StageDescriptor {
        name: "music",
        ordinal: 8,
        inputs: &[("beats", "beats")],
        outputs: &["music"],
        collaborator: Some("music_selector"),
        role: StageRole::Collaborate,
    },
    StageDescriptor {
        name: "assembly",
        ordinal: 9,
        inputs: &[
            ("images", "images"),
            ("voiceover", "voiceover"),
            ("captions", "captions"),
            ("music", "music"),
        ],
        outputs: &["assembly"],
        collaborator: Some("assembler"),
        role: StageRole::Collaborate,
    },
    StageDescriptor {
        name: "render",
        ordinal: 10,
        inputs: &[("assembly", "assembly")],
        outputs: &["render"],
        collaborator: Some("renderer"),
        role: StageRole::Collaborate,
    },
];
