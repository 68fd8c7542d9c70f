//! Incremental text-analysis orchestration.
//!
//! The engine coordinates three suggestion sources (local rules, a remote
//! grammar service, a generative service) behind caching, adaptive rate
//! limiting, change detection, and smart debouncing, keeping published
//! suggestions consistent while the user keeps typing.

pub mod cache;
pub mod change;
pub mod ignore;
pub mod limiter;
pub mod merge;
pub mod orchestrator;
pub mod rules;
pub mod scheduler;
pub mod service;

pub use cache::{CacheConfig, CacheStats, ResultCache};
pub use change::ChangeDetector;
pub use ignore::IgnoreLearner;
pub use limiter::{AdaptiveLimiter, Health, LimiterConfig};
pub use orchestrator::{CheckEngine, CheckOutcome, EngineConfig, EngineHealth};
pub use rules::BuiltinRules;
pub use scheduler::{EditPattern, SchedulerConfig, SmartScheduler};
pub use service::{
    CheckRequest, CheckResponse, GenerativeRequest, GenerativeResponse, GenerativeStats,
    GenerativeService, GrammarService, RuleChecker, StreamFrame,
};
