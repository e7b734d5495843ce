pub mod events;
pub mod fallback;
pub mod merge;
pub mod orchestrator;
pub mod registry;
pub mod undo;

pub use events::{ChangeBus, ChangeKind, SectionChangeEvent, DEPARTMENT_SECTIONS_CHANGED};
pub use fallback::{FallbackCache, FallbackDetector, InMemoryFallbackCache};
pub use merge::{merge, merge_all};
pub use orchestrator::{DragState, EngineSettings, MoveOutcome, NavigationEngine};
pub use registry::EngineRegistry;
pub use undo::UndoStack;
