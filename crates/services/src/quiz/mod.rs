mod controller;
mod outcome;

pub use controller::QuizSessionController;
pub use outcome::{
    ControllerPhase, FinalResult, FinalizeOutcome, GradeOutcome, LoadSummary, SkipReason,
    VerdictSource,
};
