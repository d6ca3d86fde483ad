//! Модуль конвейера синтеза
//!
//! Этот модуль содержит последовательную обработку фрагментов: синтез,
//! контроль ошибок и потоковую запись во временный контейнер.

pub mod adapter;
pub mod container;
pub mod governor;
pub mod job;

pub use adapter::{synthesize_chunk, Fragment, FragmentOutcome};
pub use container::{FinishedContainer, RawContainer};
pub use governor::{ChunkFailure, FailureGovernor, Verdict};
pub use job::{CancellationToken, JobFailure, JobLog, JobOutcome, JobStats, SynthesisJob};
