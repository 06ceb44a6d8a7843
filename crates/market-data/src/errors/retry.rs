/// Classification for failover policy.
///
/// Used to determine how the provider manager should respond to errors
/// from adapters during a failover chain.
///
/// # Behavior Summary
///
/// | Class | Try Next Provider? | Record Health Failure? |
/// |-------|-------------------|------------------------|
/// | `Definitive` | Yes | No (provider answered) |
/// | `Transient` | Yes | Yes (affects circuit state) |
/// | `Skipped` | Yes | No (never called) |
/// | `Fatal` | No | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The provider answered definitively and just has no data for us
    /// (symbol not found, operation not supported). The provider is
    /// healthy; move on to the next one without any penalty.
    ///
    /// A not-found answer from the *last* attempted provider is what
    /// turns the whole chain into "symbol does not exist".
    Definitive,

    /// The provider failed transiently (rate limit, timeout, malformed
    /// response, network error). Record the failure in the health record
    /// and circuit breaker, then try the next provider.
    ///
    /// Accumulated transient failures open the circuit, temporarily
    /// excluding the provider from the pool.
    Transient,

    /// The circuit breaker is open for this provider; it was skipped
    /// without being called. No penalty to record.
    Skipped,

    /// Terminal for the whole chain - every provider was exhausted or
    /// the aggregate deadline expired. Nothing left to try.
    Fatal,
}
