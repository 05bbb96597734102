//! Flatzinc modelization.

pub mod annotation;
pub mod argument;
pub mod constraint;
pub mod domain;
pub mod model;
pub mod output;
pub mod parser;
pub mod solve;
pub mod types;
pub mod variable;

pub use annotation::Annotation;
pub use argument::Argument;
pub use constraint::Constraint;
pub use constraint::CtId;
pub use domain::Domain;
pub use model::Model;
pub use output::SolutionOutput;
pub use solve::Goal;
pub use variable::VarId;
pub use variable::Variable;
