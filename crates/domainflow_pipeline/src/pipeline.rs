//! The staged submission pipeline driver.

use crate::catalog::{BoundOperation, OperationCatalog, OperationContext, OperationError};
use crate::config::{ErrorPolicy, PipelineConfig};
use crate::error::{ErrorHook, PipelineError, PipelineResult};
use crate::persistence::{CancelToken, PersistenceProvider};
use crate::Principal;
use domainflow_changeset::{ChangeSet, Operation};
use domainflow_model::{SchemaRegistry, ValidationResult};
use domainflow_validation::EntityValidator;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The kind of service request a pipeline instance was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Read-only data retrieval.
    Query,
    /// Change-set submission.
    Submit,
    /// A direct named invocation outside a change set.
    Invoke,
}

/// The pipeline's lifecycle states.
///
/// Transitions run strictly forward; `Faulted` and `Completed` are
/// terminal. A fatal error from any stage moves the pipeline to `Faulted`;
/// re-submitting afterwards is an invalid-state error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No principal bound yet.
    Uninitialized,
    /// Initialized and ready to accept a submission.
    Initialized,
    /// Resolving and authorizing operations for each entry.
    Authorizing,
    /// Running declarative validation over entry snapshots.
    Validating,
    /// Invoking domain operations in entry order.
    Executing,
    /// Flushing mutations to the backing store.
    Persisting,
    /// The submission ran to completion (possibly with entry errors).
    Completed,
    /// A fatal error aborted the submission.
    Faulted,
}

impl PipelineState {
    /// Returns true for the two terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Faulted)
    }

    /// Returns true if `submit` may be called from this state.
    pub fn accepts_submission(&self) -> bool {
        matches!(self, PipelineState::Initialized)
    }

    /// Short lowercase name, used in errors and trace events.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::Initialized => "initialized",
            PipelineState::Authorizing => "authorizing",
            PipelineState::Validating => "validating",
            PipelineState::Executing => "executing",
            PipelineState::Persisting => "persisting",
            PipelineState::Completed => "completed",
            PipelineState::Faulted => "faulted",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State bound by `initialize`.
struct InitContext {
    principal: Principal,
    kind: ServiceKind,
    validator: EntityValidator,
}

/// Drives one change set through the staged submission flow.
///
/// Collaborators are supplied up front; `initialize` binds the acting
/// principal, the service kind, and the schema exactly once, and `submit`
/// then runs authorize, validate, execute, and persist in order. Fatal
/// errors move the pipeline to `Faulted` and are routed exactly once
/// through the optional error hook; continuable outcomes (validation
/// errors, store conflicts) are recorded on the entries and returned as
/// part of the completed change set.
pub struct SubmitPipeline {
    catalog: Arc<dyn OperationCatalog>,
    persistence: Arc<dyn PersistenceProvider>,
    config: PipelineConfig,
    state: RwLock<PipelineState>,
    context: RwLock<Option<InitContext>>,
    error_hook: RwLock<Option<ErrorHook>>,
    cancel: CancelToken,
}

impl SubmitPipeline {
    /// Creates a pipeline with default configuration.
    pub fn new(
        catalog: Arc<dyn OperationCatalog>,
        persistence: Arc<dyn PersistenceProvider>,
    ) -> Self {
        Self::with_config(catalog, persistence, PipelineConfig::default())
    }

    /// Creates a pipeline with the given configuration.
    pub fn with_config(
        catalog: Arc<dyn OperationCatalog>,
        persistence: Arc<dyn PersistenceProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            catalog,
            persistence,
            config,
            state: RwLock::new(PipelineState::Uninitialized),
            context: RwLock::new(None),
            error_hook: RwLock::new(None),
            cancel: CancelToken::new(),
        }
    }

    /// Installs the error hook.
    ///
    /// The hook sees every fatal error raised during `submit` exactly once
    /// and may rewrite it before it is returned to the caller.
    pub fn set_error_hook(&self, hook: ErrorHook) {
        *self.error_hook.write() = Some(hook);
    }

    /// A clone of this pipeline's cancel token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The pipeline's current state.
    pub fn state(&self) -> PipelineState {
        *self.state.read()
    }

    /// The service kind bound at initialization, if any.
    pub fn service_kind(&self) -> Option<ServiceKind> {
        self.context.read().as_ref().map(|init| init.kind)
    }

    /// Binds the acting principal, service kind, and schema.
    ///
    /// May be called exactly once per pipeline instance; a second call is a
    /// fatal invalid-operation error. Initialization errors are returned
    /// directly and do not pass through the error hook.
    pub fn initialize(
        &self,
        principal: Principal,
        kind: ServiceKind,
        schema: Arc<SchemaRegistry>,
    ) -> PipelineResult<()> {
        let mut context = self.context.write();
        if context.is_some() {
            return Err(PipelineError::AlreadyInitialized);
        }
        *context = Some(InitContext {
            principal,
            kind,
            validator: EntityValidator::new(schema),
        });
        *self.state.write() = PipelineState::Initialized;
        tracing::debug!(kind = ?kind, "pipeline initialized");
        Ok(())
    }

    /// Runs the full submission flow over one change set.
    ///
    /// Returns the change set on any completed run, including runs that
    /// stopped with validation errors or conflicts; inspect
    /// [`ChangeSet::has_error`] to distinguish. Returns `Err` only for
    /// fatal failures.
    pub fn submit(&self, change_set: ChangeSet) -> PipelineResult<ChangeSet> {
        let context = self.context.read();
        let Some(init) = context.as_ref() else {
            return Err(self.fault(PipelineError::NotInitialized));
        };

        let current = self.state();
        if !current.accepts_submission() {
            return Err(self.fault(PipelineError::InvalidState {
                state: current.to_string(),
            }));
        }
        if change_set.is_empty() {
            return Err(self.fault(PipelineError::EmptyChangeSet));
        }
        if change_set.len() > self.config.max_entries() {
            return Err(self.fault(PipelineError::TooManyEntries {
                max: self.config.max_entries(),
                actual: change_set.len(),
            }));
        }

        let bound = self.authorize_entries(&change_set, init)?;
        self.checkpoint()?;

        if !self.validate_entries(&change_set, init)? {
            return Ok(change_set);
        }
        self.checkpoint()?;

        self.execute_entries(&change_set, init, &bound)?;
        if change_set.has_error() {
            self.transition(PipelineState::Completed);
            return Ok(change_set);
        }
        self.checkpoint()?;

        self.persist_entries(&change_set)?;
        self.transition(PipelineState::Completed);
        Ok(change_set)
    }

    /// Resolves and authorizes an operation for every mutating entry.
    fn authorize_entries(
        &self,
        change_set: &ChangeSet,
        init: &InitContext,
    ) -> PipelineResult<HashMap<u64, Arc<BoundOperation>>> {
        self.transition(PipelineState::Authorizing);

        let mut bound = HashMap::new();
        for entry in change_set.entries() {
            if entry.operation() == Operation::None {
                continue;
            }
            let entity_type = entry.entity().type_name();
            let Some(handle) = self.catalog.resolve(entity_type, entry.operation()) else {
                return Err(self.fault(PipelineError::unknown_operation(
                    entity_type,
                    entry.operation(),
                )));
            };
            if !handle.authorize(&init.principal) {
                return Err(self.fault(PipelineError::access_denied(handle.name())));
            }
            bound.insert(entry.id(), handle);
        }
        Ok(bound)
    }

    /// Runs declarative validation; returns false when the submission
    /// stops here under [`ErrorPolicy::AbortBatch`].
    fn validate_entries(&self, change_set: &ChangeSet, init: &InitContext) -> PipelineResult<bool> {
        self.transition(PipelineState::Validating);

        for entry in change_set.entries() {
            // Deleted entries carry no client-visible state to validate.
            if matches!(entry.operation(), Operation::None | Operation::Delete) {
                continue;
            }
            for result in init.validator.validate(entry.entity()) {
                entry.add_validation_error(result);
            }
        }

        if change_set.has_error() && self.config.error_policy() == ErrorPolicy::AbortBatch {
            tracing::debug!("validation errors present, batch aborted");
            self.transition(PipelineState::Completed);
            return Ok(false);
        }
        Ok(true)
    }

    /// Invokes domain operations in entry order, skipping invalid entries.
    fn execute_entries(
        &self,
        change_set: &ChangeSet,
        init: &InitContext,
        bound: &HashMap<u64, Arc<BoundOperation>>,
    ) -> PipelineResult<()> {
        self.transition(PipelineState::Executing);

        let op_context = OperationContext::new(&init.principal, change_set);
        for entry in change_set.entries() {
            if entry.has_validation_errors() {
                continue;
            }
            let Some(handle) = bound.get(&entry.id()) else {
                continue;
            };
            match handle.invoke(&op_context, entry, entry.named_actions()) {
                Ok(()) => {}
                Err(OperationError::Validation { message, members }) => {
                    entry.add_validation_error(ValidationResult::new(message, members));
                }
                Err(OperationError::Failed { message }) => {
                    return Err(
                        self.fault(PipelineError::operation_failed(handle.name(), message))
                    );
                }
            }
        }
        Ok(())
    }

    /// Persists the batch and, on a clean persist, applies queued
    /// store-transform callbacks.
    fn persist_entries(&self, change_set: &ChangeSet) -> PipelineResult<()> {
        self.transition(PipelineState::Persisting);

        match self.persistence.persist(change_set, &self.cancel) {
            Ok(true) => {}
            Ok(false) => {
                // Conflicts are recorded on the entries; transforms are
                // skipped since nothing was committed for them to map.
                tracing::debug!("persistence completed with conflicts");
                return Ok(());
            }
            Err(error) => return Err(self.fault(error)),
        }

        if let Err(error) = change_set.apply_store_transforms() {
            return Err(self.fault(error.into()));
        }
        Ok(())
    }

    /// Stage-boundary cancellation check.
    fn checkpoint(&self) -> PipelineResult<()> {
        if self.cancel.is_cancelled() {
            return Err(self.fault(PipelineError::Cancelled));
        }
        Ok(())
    }

    fn transition(&self, next: PipelineState) {
        *self.state.write() = next;
        tracing::debug!(state = %next, "pipeline stage");
    }

    /// The fault funnel: marks the pipeline faulted and routes the error
    /// through the hook exactly once.
    fn fault(&self, error: PipelineError) -> PipelineError {
        *self.state.write() = PipelineState::Faulted;
        tracing::warn!(error = %error, "submission faulted");
        match self.error_hook.read().as_ref() {
            Some(hook) => hook(error),
            None => error,
        }
    }
}

impl fmt::Debug for SubmitPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitPipeline")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryOperationCatalog;
    use crate::persistence::MemoryPersistence;

    fn pipeline() -> SubmitPipeline {
        SubmitPipeline::new(
            Arc::new(MemoryOperationCatalog::new()),
            Arc::new(MemoryPersistence::new()),
        )
    }

    #[test]
    fn state_predicates() {
        assert!(PipelineState::Completed.is_terminal());
        assert!(PipelineState::Faulted.is_terminal());
        assert!(!PipelineState::Executing.is_terminal());
        assert!(PipelineState::Initialized.accepts_submission());
        assert!(!PipelineState::Uninitialized.accepts_submission());
    }

    #[test]
    fn double_initialize_is_fatal() {
        let pipeline = pipeline();
        let schema = Arc::new(SchemaRegistry::new());

        pipeline
            .initialize(Principal::anonymous(), ServiceKind::Submit, schema.clone())
            .unwrap();
        assert_eq!(pipeline.state(), PipelineState::Initialized);
        assert_eq!(pipeline.service_kind(), Some(ServiceKind::Submit));

        let err = pipeline
            .initialize(Principal::anonymous(), ServiceKind::Submit, schema)
            .unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyInitialized));
    }

    #[test]
    fn submit_before_initialize_is_fatal() {
        let pipeline = pipeline();
        let set = domainflow_changeset::ChangeSet::new(
            vec![domainflow_changeset::ChangeEntry::insert(
                1,
                domainflow_model::Entity::new("Order"),
            )],
            Arc::new(SchemaRegistry::new()),
        )
        .unwrap();

        let err = pipeline.submit(set).unwrap_err();
        assert!(matches!(err, PipelineError::NotInitialized));
        assert_eq!(pipeline.state(), PipelineState::Faulted);
    }
}
