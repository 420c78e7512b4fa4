//! `vidrelay-downloader` — turns resource keys into fetched records.
//!
//! The [`executor::Executor`] answers from the resource cache when it can,
//! probes metadata to detect aliases, and otherwise runs one real fetch at a
//! time through the [`gate::SingleFlight`] gate under a hard timeout. The
//! extraction itself sits behind the [`extractor::Extractor`] trait; the
//! production binding shells out to `yt-dlp` ([`ytdlp::YtDlpExtractor`]).

pub mod classify;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod gate;
pub mod media;
pub mod ytdlp;

pub use classify::{ErrorClass, ErrorClassifier};
pub use error::{ExecError, ExtractError};
pub use executor::Executor;
pub use extractor::{Extractor, Fetched, Metadata, QualityProfile};
pub use gate::SingleFlight;
pub use ytdlp::YtDlpExtractor;
