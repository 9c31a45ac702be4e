//! Define, advance and inspect named sequences over a pluggable store.
//!
//! Every mutation of a sequence's value goes through
//! [`SequenceStore::compare_and_set_value`] keyed by the value read at the
//! start of the attempt. A lost race is retried with backoff; once the retry
//! budget is spent the caller gets [`SequenceError::ConcurrencyExhausted`].

use std::sync::Arc;

use backon::BlockingRetryable;

use crate::contracts::{
    CodecError, SequenceConfig, SequenceDefinition, SequenceError, SequenceId, SequenceStore,
};
use crate::metrics::ServiceMetrics;
use crate::numeral::{NumeralSystem, Step};
use crate::storage::RetryConfig;

/// Configuration for [`SequenceService`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Retry policy for lost compare-and-set races.
    pub retry: RetryConfig,
}

impl ServiceConfig {
    /// Reads the retry policy from `NUMSEQ_CAS_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            retry: RetryConfig::from_env(),
        }
    }
}

/// Values claimed by one successful compare-and-set.
struct Reservation {
    definition: SequenceDefinition,
    raw_values: Vec<String>,
    last: String,
}

/// Sequence operations over a shared store.
///
/// Holds no per-sequence state of its own; clones of the store `Arc` can be
/// handed to any number of services or threads.
pub struct SequenceService<S: SequenceStore> {
    store: Arc<S>,
    config: ServiceConfig,
    metrics: Arc<ServiceMetrics>,
}

impl<S: SequenceStore> SequenceService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, ServiceConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: ServiceConfig) -> Self {
        Self {
            store,
            config,
            metrics: Arc::new(ServiceMetrics::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    /// Defines a new sequence and returns its store-assigned id.
    ///
    /// Without `initial_value` the sequence starts from the all-pad value.
    /// Validation happens before the store is touched; the uniqueness check
    /// is the store's atomic create-if-absent.
    pub fn define_sequence(
        &self,
        name: &str,
        config: SequenceConfig,
        initial_value: Option<&str>,
    ) -> Result<SequenceId, SequenceError> {
        if name.is_empty() {
            return Err(SequenceError::InvalidName);
        }

        let system = config.numeral_system()?;
        let current_value = match initial_value {
            Some(raw) => {
                system
                    .validate(raw)
                    .map_err(|e| SequenceError::InvalidInitialValue(e.to_string()))?;
                raw.to_string()
            }
            None => system.blank(),
        };

        let definition = SequenceDefinition::new(name, config, current_value);
        // RocksDB can report a busy row lock on create; that is a lost race too.
        let id = self.with_retry(name, || {
            Ok(self.store.create_if_absent(definition.clone())?)
        })?;
        self.metrics.record_definition();

        tracing::info!(
            sequence = %name,
            id = %id,
            base = system.base(),
            width = system.width(),
            "Defined sequence"
        );
        Ok(id)
    }

    /// Advances the sequence by one and returns the decorated new value.
    pub fn advance(&self, name: &str) -> Result<String, SequenceError> {
        let reservation = self.reserve(name, 1)?;
        Ok(reservation.definition.decorate(&reservation.last))
    }

    /// Claims the next `count` values in one compare-and-set.
    ///
    /// All or nothing: if fewer than `count` values remain the sequence is
    /// left untouched and `SequenceExhausted` is returned.
    pub fn advance_many(&self, name: &str, count: usize) -> Result<Vec<String>, SequenceError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let reservation = self.reserve(name, count)?;
        Ok(reservation
            .raw_values
            .iter()
            .map(|raw| reservation.definition.decorate(raw))
            .collect())
    }

    /// Returns `base^width` for the named sequence.
    pub fn capacity_of(&self, name: &str) -> Result<u128, SequenceError> {
        let definition = self.lookup(name)?;
        Ok(Self::system_of(&definition)?.capacity())
    }

    /// Number of values `advance` can still hand out.
    pub fn remaining(&self, name: &str) -> Result<u128, SequenceError> {
        let definition = self.lookup(name)?;
        Self::system_of(&definition)?
            .remaining(&definition.current_value)
            .map_err(|e| Self::corrupt(name, e))
    }

    /// The decorated current value, or `None` while it is still the all-pad start.
    pub fn current(&self, name: &str) -> Result<Option<String>, SequenceError> {
        let definition = self.lookup(name)?;
        let system = Self::system_of(&definition)?;
        if definition.current_value == system.blank() {
            return Ok(None);
        }
        Ok(Some(definition.decorate(&definition.current_value)))
    }

    pub fn definition(&self, name: &str) -> Result<SequenceDefinition, SequenceError> {
        self.lookup(name)
    }

    /// Names of all defined sequences, sorted.
    pub fn list_sequences(&self) -> Result<Vec<String>, SequenceError> {
        Ok(self.store.list_names()?)
    }

    fn lookup(&self, name: &str) -> Result<SequenceDefinition, SequenceError> {
        self.store
            .find_by_name(name)?
            .ok_or_else(|| SequenceError::NotFound(name.to_string()))
    }

    fn system_of(definition: &SequenceDefinition) -> Result<NumeralSystem, SequenceError> {
        definition
            .numeral_system()
            .map_err(|e| Self::corrupt(&definition.name, e))
    }

    // Stored definitions were validated on the way in.
    fn corrupt(name: &str, err: CodecError) -> SequenceError {
        SequenceError::BackendUnavailable(format!("stored sequence {} is invalid: {}", name, err))
    }

    /// Runs `op` until it stops losing compare-and-set races or the retry
    /// budget is spent.
    fn with_retry<T>(
        &self,
        name: &str,
        op: impl FnMut() -> Result<T, SequenceError>,
    ) -> Result<T, SequenceError> {
        let result = op
            .retry(self.config.retry.backoff())
            .sleep(std::thread::sleep)
            .when(SequenceError::is_retryable)
            .notify(|err, dur| {
                self.metrics.record_conflict();
                tracing::warn!(
                    sequence = %name,
                    error = %err,
                    retry_in = ?dur,
                    "Lost compare-and-set race, retrying"
                );
            })
            .call();

        match result {
            Err(SequenceError::Conflict(_)) => {
                self.metrics.record_conflict();
                self.metrics.record_retries_exhausted();
                let attempts = self.config.retry.max_attempts();
                tracing::warn!(sequence = %name, attempts, "Giving up after repeated conflicts");
                Err(SequenceError::ConcurrencyExhausted {
                    name: name.to_string(),
                    attempts,
                })
            }
            other => other,
        }
    }

    /// Runs the read-increment-compare-and-set cycle, retrying lost races.
    fn reserve(&self, name: &str, count: usize) -> Result<Reservation, SequenceError> {
        match self.with_retry(name, || self.try_reserve(name, count)) {
            Ok(reservation) => {
                self.metrics.record_advance(count as u64);
                tracing::debug!(
                    sequence = %name,
                    count,
                    value = %reservation.last,
                    "Advanced sequence"
                );
                Ok(reservation)
            }
            Err(e @ SequenceError::SequenceExhausted(_)) => {
                self.metrics.record_exhausted();
                tracing::warn!(sequence = %name, count, "Sequence exhausted");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn try_reserve(&self, name: &str, count: usize) -> Result<Reservation, SequenceError> {
        let definition = self.lookup(name)?;
        let system = Self::system_of(&definition)?;

        let remaining = system
            .remaining(&definition.current_value)
            .map_err(|e| Self::corrupt(name, e))?;
        if count as u128 > remaining {
            return Err(SequenceError::SequenceExhausted(name.to_string()));
        }

        let mut raw_values = Vec::with_capacity(count);
        let mut last = definition.current_value.clone();
        for _ in 0..count {
            match system.increment(&last).map_err(|e| Self::corrupt(name, e))? {
                Step::Next(value) => {
                    raw_values.push(value.clone());
                    last = value;
                }
                Step::Overflow => return Err(SequenceError::SequenceExhausted(name.to_string())),
            }
        }

        self.store
            .compare_and_set_value(name, &definition.current_value, &last)?;
        Ok(Reservation {
            definition,
            raw_values,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::contracts::StoreError;
    use crate::storage::MemorySequenceStore;

    fn service() -> SequenceService<MemorySequenceStore> {
        SequenceService::new(Arc::new(MemorySequenceStore::new()))
    }

    fn decimal() -> SequenceConfig {
        SequenceConfig::new("0123456789", '0', 2)
    }

    /// Loses the first `failures` compare-and-sets and the first
    /// `create_failures` creates, then delegates.
    struct FlakyStore {
        inner: MemorySequenceStore,
        failures: AtomicUsize,
        create_failures: AtomicUsize,
        cas_calls: AtomicUsize,
        create_calls: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: MemorySequenceStore::new(),
                failures: AtomicUsize::new(failures),
                create_failures: AtomicUsize::new(0),
                cas_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
            }
        }

        fn with_create_failures(self, create_failures: usize) -> Self {
            self.create_failures.store(create_failures, Ordering::SeqCst);
            self
        }
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        let left = counter.load(Ordering::SeqCst);
        if left > 0 {
            counter.store(left - 1, Ordering::SeqCst);
        }
        left > 0
    }

    impl SequenceStore for FlakyStore {
        fn find_by_name(&self, name: &str) -> Result<Option<SequenceDefinition>, StoreError> {
            self.inner.find_by_name(name)
        }

        fn create_if_absent(
            &self,
            definition: SequenceDefinition,
        ) -> Result<SequenceId, StoreError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if take_failure(&self.create_failures) {
                return Err(StoreError::Conflict(definition.name));
            }
            self.inner.create_if_absent(definition)
        }

        fn compare_and_set_value(
            &self,
            name: &str,
            expected: &str,
            new_value: &str,
        ) -> Result<(), StoreError> {
            self.cas_calls.fetch_add(1, Ordering::SeqCst);
            if take_failure(&self.failures) {
                return Err(StoreError::Conflict(name.to_string()));
            }
            self.inner.compare_and_set_value(name, expected, new_value)
        }

        fn list_names(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list_names()
        }
    }

    fn fast_retry(max_retries: usize) -> ServiceConfig {
        ServiceConfig {
            retry: RetryConfig {
                max_retries,
                initial_delay_ms: 1,
                max_delay_ms: 2,
            },
        }
    }

    #[test]
    fn decimal_sequence_counts_up() {
        let service = service();
        service.define_sequence("tickets", decimal(), None).unwrap();
        assert_eq!(service.advance("tickets").unwrap(), "01");
        assert_eq!(service.advance("tickets").unwrap(), "02");
    }

    #[test]
    fn prefix_and_suffix_decorate_only_the_output() {
        let service = service();
        let config = SequenceConfig::new("ABCDEF", ' ', 8)
            .with_prefix("FOO-")
            .with_suffix("-BAR");
        service
            .define_sequence("invoices", config, Some("EEEEEEEF"))
            .unwrap();

        assert_eq!(service.advance("invoices").unwrap(), "FOO-EEEEEEFA-BAR");
        assert_eq!(
            service.definition("invoices").unwrap().current_value,
            "EEEEEEFA"
        );
    }

    #[test]
    fn define_rejects_bad_input_before_writing() {
        let service = service();
        assert_eq!(
            service.define_sequence("", decimal(), None),
            Err(SequenceError::InvalidName)
        );
        assert!(matches!(
            service.define_sequence("a", SequenceConfig::new("AA", ' ', 2), None),
            Err(SequenceError::InvalidAlphabet(_))
        ));
        assert!(matches!(
            service.define_sequence("a", SequenceConfig::new("AB", ' ', 0), None),
            Err(SequenceError::InvalidWidth { .. })
        ));
        assert_eq!(
            service.define_sequence("a", SequenceConfig::new("AB", 'B', 2), None),
            Err(SequenceError::InvalidPadChar('B'))
        );
        assert!(matches!(
            service.define_sequence("a", decimal(), Some("123")),
            Err(SequenceError::InvalidInitialValue(_))
        ));
        assert!(service.store().is_empty());
    }

    #[test]
    fn duplicate_definition_keeps_original_value() {
        let service = service();
        service.define_sequence("tickets", decimal(), None).unwrap();
        service.advance("tickets").unwrap();

        let err = service
            .define_sequence("tickets", decimal(), Some("50"))
            .unwrap_err();
        assert_eq!(err, SequenceError::DuplicateName("tickets".into()));
        assert_eq!(service.definition("tickets").unwrap().current_value, "01");
    }

    #[test]
    fn unknown_names_are_not_found() {
        let service = service();
        assert_eq!(
            service.advance("nope"),
            Err(SequenceError::NotFound("nope".into()))
        );
        assert!(matches!(
            service.capacity_of("nope"),
            Err(SequenceError::NotFound(_))
        ));
        assert!(matches!(
            service.advance_many("nope", 3),
            Err(SequenceError::NotFound(_))
        ));
    }

    #[test]
    fn exhaustion_is_terminal_but_capacity_stays_available() {
        let service = service();
        service
            .define_sequence("tiny", SequenceConfig::new("01", '0', 1), None)
            .unwrap();

        assert_eq!(service.advance("tiny").unwrap(), "1");
        for _ in 0..3 {
            assert_eq!(
                service.advance("tiny"),
                Err(SequenceError::SequenceExhausted("tiny".into()))
            );
        }
        assert_eq!(service.definition("tiny").unwrap().current_value, "1");
        assert_eq!(service.capacity_of("tiny").unwrap(), 2);
        assert_eq!(service.metrics().snapshot().exhausted_total, 3);
    }

    #[test]
    fn capacity_and_remaining_track_progress() {
        let service = service();
        service
            .define_sequence("codes", SequenceConfig::new("ABCDEF", ' ', 3), None)
            .unwrap();
        assert_eq!(service.capacity_of("codes").unwrap(), 216);
        assert_eq!(service.remaining("codes").unwrap(), 216);

        service.advance_many("codes", 10).unwrap();
        assert_eq!(service.remaining("codes").unwrap(), 206);
        assert_eq!(service.capacity_of("codes").unwrap(), 216);
    }

    #[test]
    fn advance_many_returns_consecutive_values() {
        let service = service();
        service
            .define_sequence(
                "codes",
                SequenceConfig::new("ABCDEF", ' ', 3).with_prefix("#"),
                None,
            )
            .unwrap();

        let values = service.advance_many("codes", 8).unwrap();
        assert_eq!(
            values,
            vec!["#  A", "#  B", "#  C", "#  D", "#  E", "#  F", "# BA", "# BB"]
        );
        assert_eq!(service.advance("codes").unwrap(), "# BC");
        assert!(service.advance_many("codes", 0).unwrap().is_empty());
    }

    #[test]
    fn advance_many_past_the_end_writes_nothing() {
        let service = service();
        service.define_sequence("tickets", decimal(), Some("97")).unwrap();

        assert_eq!(
            service.advance_many("tickets", 3),
            Err(SequenceError::SequenceExhausted("tickets".into()))
        );
        assert_eq!(service.definition("tickets").unwrap().current_value, "97");
        assert_eq!(service.advance_many("tickets", 2).unwrap(), vec!["98", "99"]);
    }

    #[test]
    fn oversized_batch_is_rejected_without_allocating() {
        let service = service();
        service
            .define_sequence("bits", SequenceConfig::new("01", '.', 2), None)
            .unwrap();

        for count in [usize::MAX, 1 << 32, 5] {
            assert_eq!(
                service.advance_many("bits", count),
                Err(SequenceError::SequenceExhausted("bits".into()))
            );
        }
        assert_eq!(service.definition("bits").unwrap().current_value, "..");
        assert_eq!(service.advance_many("bits", 4).unwrap(), vec![".0", ".1", "10", "11"]);
    }

    #[test]
    fn current_is_none_until_first_advance() {
        let service = service();
        service
            .define_sequence(
                "codes",
                SequenceConfig::new("ABCDEF", ' ', 3).with_suffix("!"),
                None,
            )
            .unwrap();
        assert_eq!(service.current("codes").unwrap(), None);
        service.advance("codes").unwrap();
        assert_eq!(service.current("codes").unwrap(), Some("  A!".into()));
    }

    #[test]
    fn conflicts_are_retried() {
        let store = Arc::new(FlakyStore::new(2));
        let service = SequenceService::with_config(Arc::clone(&store), fast_retry(5));
        service.define_sequence("tickets", decimal(), None).unwrap();

        assert_eq!(service.advance("tickets").unwrap(), "01");
        assert_eq!(store.cas_calls.load(Ordering::SeqCst), 3);
        assert_eq!(service.metrics().snapshot().conflicts_total, 2);
    }

    #[test]
    fn persistent_conflicts_exhaust_retries() {
        let store = Arc::new(FlakyStore::new(usize::MAX));
        let service = SequenceService::with_config(Arc::clone(&store), fast_retry(3));
        service.define_sequence("tickets", decimal(), None).unwrap();

        assert_eq!(
            service.advance("tickets"),
            Err(SequenceError::ConcurrencyExhausted {
                name: "tickets".into(),
                attempts: 4
            })
        );
        assert_eq!(store.cas_calls.load(Ordering::SeqCst), 4);
        assert_eq!(service.definition("tickets").unwrap().current_value, "00");
        assert_eq!(service.metrics().snapshot().retries_exhausted_total, 1);
    }

    #[test]
    fn contended_definitions_are_retried() {
        let store = Arc::new(FlakyStore::new(0).with_create_failures(2));
        let service = SequenceService::with_config(Arc::clone(&store), fast_retry(5));

        let id = service.define_sequence("tickets", decimal(), None).unwrap();
        assert_eq!(store.inner.id_of("tickets"), Some(id));
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 3);
        assert_eq!(service.metrics().snapshot().conflicts_total, 2);
    }

    #[test]
    fn persistent_definition_conflicts_never_leak() {
        let store = Arc::new(FlakyStore::new(0).with_create_failures(usize::MAX));
        let service = SequenceService::with_config(Arc::clone(&store), fast_retry(2));

        assert_eq!(
            service.define_sequence("tickets", decimal(), None),
            Err(SequenceError::ConcurrencyExhausted {
                name: "tickets".into(),
                attempts: 3
            })
        );
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 3);
        assert!(store.inner.is_empty());
    }

    #[test]
    fn list_sequences_returns_sorted_names() {
        let service = service();
        for name in ["orders", "invoices"] {
            service.define_sequence(name, decimal(), None).unwrap();
        }
        assert_eq!(service.list_sequences().unwrap(), vec!["invoices", "orders"]);
    }
}
