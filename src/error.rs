//! Error types for the dfense-forecast library.

use thiserror::Error;

/// Result type alias for forecasting operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while building a regional forecast.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input violates the aggregated-CSV schema or value contract.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Epidemiological week outside the 1..=52 range.
    #[error("invalid epiweek: year {year}, week {week}")]
    InvalidEpiweek { year: i32, week: u32 },

    /// Training span shorter than the minimum required by the chosen model.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Dimension mismatch between cooperating series or matrices.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    /// Infinite or NaN value where a finite one is required.
    #[error("non-finite value in {0}")]
    NonFinite(String),

    /// Covariance factorization failed after both regularization attempts.
    #[error("Cholesky factorization failed after regularization")]
    CholeskyFailed,

    /// The ODE integrator aborted or produced a non-real state.
    #[error("integration failure: {0}")]
    IntegrationFailure(String),

    /// Generic numerical breakdown outside the named failure modes.
    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    /// The optimizer or estimator did not produce a usable fit.
    #[error("model fit failed: {0}")]
    ModelFit(String),

    /// Monotonicity self-check violated after final rounding.
    #[error("output contract violated: {0}")]
    OutputContract(String),

    /// Filesystem or encoding error at the I/O boundary.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ForecastError {
    fn from(err: std::io::Error) -> Self {
        ForecastError::Io(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::Io(err.to_string())
    }
}

/// Pipeline stage that produced a failure, used for diagnostic tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Ingest,
    Calendar,
    ClimateGenerator,
    Calibrator,
    MonteCarlo,
    Sarimax,
    Arp,
    Assembler,
    Writer,
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Component::Ingest => "ingest",
            Component::Calendar => "calendar",
            Component::ClimateGenerator => "climate-generator",
            Component::Calibrator => "calibrator",
            Component::MonteCarlo => "monte-carlo",
            Component::Sarimax => "sarimax",
            Component::Arp => "arp",
            Component::Assembler => "assembler",
            Component::Writer => "writer",
        };
        f.write_str(name)
    }
}

/// A forecast failure tagged with the region and the component that raised it.
///
/// This is the one-line diagnostic surfaced on the error stream; the region's
/// output CSV is never written when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("region={region} component={component}: {source}")]
pub struct RegionFailure {
    pub region: String,
    pub component: Component,
    #[source]
    pub source: ForecastError,
}

impl RegionFailure {
    pub fn new(region: impl Into<String>, component: Component, source: ForecastError) -> Self {
        Self {
            region: region.into(),
            component,
            source,
        }
    }
}

/// Extension for tagging a library error with region/component context.
pub trait TagFailure<T> {
    fn tag(self, region: &str, component: Component) -> std::result::Result<T, RegionFailure>;
}

impl<T> TagFailure<T> for Result<T> {
    fn tag(self, region: &str, component: Component) -> std::result::Result<T, RegionFailure> {
        self.map_err(|e| RegionFailure::new(region, component, e))
    }
}
