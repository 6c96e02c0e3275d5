//! # question_forge
//!
//! Four-stage editorial pipeline that drafts multiple-choice questions for a
//! set of learning objectives and has them reviewed, using a generative text
//! service for every stage.
//!
//! ## Task Flow
//!
//! ```text
//!   objectives + theory
//!           │
//!           ▼
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │   content    │──►│      rt      │──►│      de      │──►│  validator   │
//!   │ draft 1/obj  │   │ tech review  │   │ design review│   │ report + doc │
//!   └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//!           │                  │                  │                  │
//!           └──── prompt ─► GenerativeService ─► Extractor ─► VocabularyFilter
//!                                                                    │
//!                                                   Question::from_record ─► merge
//! ```
//!
//! ## Modules
//! - `workflow`: `WorkflowEngine`, stage ordering, prompts and merging
//! - `extract`: recovers structured records from free-form responses
//! - `vocabulary`: restricted-term scanning and rewriting
//! - `question` / `task` / `report`: domain model
//! - `llm`: generative-service clients, stand-in and fallback
//! - `store`: task snapshots and artifacts
//! - `materials`: templates, stopwords and review checklists

pub mod config;
pub mod extract;
pub mod llm;
pub mod materials;
pub mod question;
pub mod report;
pub mod store;
pub mod task;
pub mod util;
pub mod vocabulary;
pub mod workflow;

pub use config::Config;
pub use task::{Stage, Task, TaskId, TaskStatus};
pub use workflow::{StageOutcome, WorkflowEngine, WorkflowError};
