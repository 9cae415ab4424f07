use thiserror::Error;

/// Failures that abort a conversion before any output is written.
#[derive(Error, Debug, PartialEq)]
pub enum ConvertError {
    #[error("Could not find baseline grid lines in PDF (found {found}, expected {expected})")]
    BaselineNotFound { found: usize, expected: usize },

    #[error("No waveform samples were extracted from any row")]
    NoSamples,

    #[error("Page {0} not found")]
    PageNotFound(u32),
}
