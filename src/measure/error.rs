use thiserror::Error;

/// Errors raised by the measurement library.
#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("cannot reduce an empty set of readings")]
    EmptySampleSet,

    #[error("line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("not enough forward-conduction points to fit ({0} usable)")]
    FitUnderdetermined(usize),

    #[error("fit is degenerate: {0}")]
    FitDegenerate(&'static str),

    #[error("chart rendering failed: {0}")]
    Chart(String),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for MeasureError
{
    fn from(err: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        MeasureError::Chart(err.to_string())
    }
}

impl From<image::ImageError> for MeasureError {
    fn from(err: image::ImageError) -> Self {
        MeasureError::Chart(err.to_string())
    }
}
