pub mod context;
pub mod engine;
pub mod graph;
pub mod router;
pub mod state;
pub mod steps;

pub use context::AssistantContext;
pub use engine::{ExecutionTrace, RouteLabel, Step, WorkflowGraph};
pub use graph::{build_question_graph, max_steps, QuestionGraph};
pub use state::{Relevance, WorkflowState};
