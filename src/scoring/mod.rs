mod criteria;
mod semantic;
mod similarity;
pub mod vector;
pub mod windows;

pub use criteria::{Challenge, Criterion};
pub use semantic::{
    criterion_contribution, evaluate, normalize_score, CriterionMatch, SemanticEvaluation,
};
pub use similarity::{ideal_pitch_similarity, similarity_to_score, SemanticSimilarity};
pub use vector::cosine_similarity;
pub use windows::{create_windows, Window};
