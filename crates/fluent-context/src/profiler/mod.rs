pub mod project_profiler;

pub use project_profiler::{ProjectProfile, ProjectProfiler, ProjectType, SizeBucket};
