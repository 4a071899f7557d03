use thiserror::Error;

/// Convenience result type for join operations.
pub type JoinResult<T> = Result<T, JoinError>;

/// Error type returned across the join core.
///
/// All errors are terminal for the run: the caller must not resume pulling
/// rows after observing one. Retry, if any, belongs to the host pipeline.
#[derive(Debug, Error)]
pub enum JoinError {
    /// A key template references a field absent from the current row.
    #[error("missing key field '{field}' in row")]
    MissingField { field: String },

    /// The target resource was encountered before the source resource.
    ///
    /// Field names avoid `source`, which thiserror reserves for the
    /// underlying-cause convention.
    #[error("ordering violation: source resource '{source_name}' must precede target resource '{target_name}'")]
    OrderingViolation {
        source_name: String,
        target_name: String,
    },

    /// An output field has no fixed type and no matching field in the source schema.
    #[error("cannot resolve type for output field '{field}': no source field named '{source_field}'")]
    SchemaResolution { field: String, source_field: String },

    /// A row value is unusable for the configured aggregation (e.g. a string
    /// fed to `sum`, or incomparable values for `max`/`min`).
    #[error("invalid value for {aggregate} on field '{field}': {value}")]
    InvalidValue {
        aggregate: &'static str,
        field: String,
        value: serde_json::Value,
    },

    /// Underlying aggregation-store error.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Accumulator state failed to (de)serialize for the backing store.
    #[error("state serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Underlying I/O error (e.g. creating the store's temporary file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
