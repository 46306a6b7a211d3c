//! Ensemble builders.

mod combine;
mod method;
mod relative_skill;
mod simple;
mod traits;

pub use method::EnsembleMethod;
pub use relative_skill::{RelativeSkill, RelativeSkillConfig};
pub use simple::SimpleAverage;
pub use traits::{BoxedBuilder, BuiltEnsemble, EnsembleBuilder};
