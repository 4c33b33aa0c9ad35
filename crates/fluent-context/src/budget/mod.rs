pub mod allocator;

pub use allocator::{AllocationResult, AllocationStrategy, Budget, BudgetAllocator};
