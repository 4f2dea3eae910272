//! Provisioning session: creates resources in dependency order and
//! guarantees their deletion in reverse order.

use std::collections::BTreeMap;
use std::sync::Arc;

use provision_core::{ResourceAddress, ResourceId, ResourceKind, Settings};
use provision_ledger::{DrainGuard, DrainReport, LedgerState, UndoAction};
use tracing::{debug, info};

use crate::payload::{redacted, request_for};
use crate::poll::PollContext;
use crate::traits::{EventSink, NullSink, ProvisionedResource, ResourceProvider};
use crate::{OperationError, Result};

/// Everything a provider call needs: the provider, the poll context and
/// where to report confirmations.
pub struct Connection<P: ?Sized> {
    provider: Arc<P>,
    poll: PollContext,
    events: Arc<dyn EventSink>,
}

impl<P: ?Sized> Clone for Connection<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            poll: self.poll.clone(),
            events: Arc::clone(&self.events),
        }
    }
}

impl<P: ResourceProvider + ?Sized> Connection<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, poll: PollContext) -> Self {
        Self {
            provider,
            poll,
            events: Arc::new(NullSink),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn poll(&self) -> &PollContext {
        &self.poll
    }

    #[must_use]
    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// The same connection with an uncancelled poll context, for teardown.
    #[must_use]
    pub fn for_cleanup(&self) -> Self {
        Self {
            poll: self.poll.fresh(),
            ..self.clone()
        }
    }
}

/// Undo action that deletes one created resource.
pub struct DeleteResource {
    address: ResourceAddress,
    id: ResourceId,
}

impl DeleteResource {
    #[must_use]
    pub fn new(address: ResourceAddress, id: ResourceId) -> Self {
        Self { address, id }
    }
}

impl<P: ResourceProvider + ?Sized> UndoAction<Connection<P>, OperationError> for DeleteResource {
    fn name(&self) -> &str {
        self.address.kind.tag()
    }

    fn undo(&self, connection: &Connection<P>) -> Result<()> {
        connection
            .provider()
            .delete(&self.address, connection.poll())?;
        connection.events().resource_deleted(&self.address, &self.id);
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "delete {} '{}'",
            self.address.kind.display_name().to_lowercase(),
            self.address.name
        )
    }
}

/// Outcome of one provisioning run.
#[derive(Debug)]
pub struct RunReport {
    /// Resources created, in creation order.
    pub created: Vec<ProvisionedResource>,
    pub provisioning: Result<()>,
    pub cleanup: DrainReport<OperationError>,
}

impl RunReport {
    /// `true` when every requested resource was created.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.provisioning.is_ok()
    }

    #[must_use]
    pub fn created_kinds(&self) -> Vec<ResourceKind> {
        self.created.iter().map(|r| r.kind).collect()
    }
}

/// One provisioning run.
///
/// Each successful creation records its deletion in the session's ledger
/// before anything else happens. The ledger is drained when
/// [`ProvisioningSession::finish`] is called or, on any other exit path,
/// when the session is dropped.
pub struct ProvisioningSession<'s, P: ResourceProvider + ?Sized + 'static> {
    settings: &'s Settings,
    connection: Connection<P>,
    ledger: DrainGuard<Connection<P>, OperationError>,
    ids: BTreeMap<ResourceKind, ResourceId>,
    created: Vec<ProvisionedResource>,
}

impl<'s, P: ResourceProvider + ?Sized + 'static> ProvisioningSession<'s, P> {
    #[must_use]
    pub fn new(settings: &'s Settings, connection: Connection<P>) -> Self {
        let ledger = DrainGuard::new(connection.for_cleanup());
        Self {
            settings,
            connection,
            ledger,
            ids: BTreeMap::new(),
            created: Vec::new(),
        }
    }

    /// Create one resource and record its deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the prerequisite resource has not been created in
    /// this session or the provider fails. Once a step has failed every
    /// further call returns [`OperationError::SessionAborted`] without
    /// contacting the provider.
    pub fn provision(&mut self, kind: ResourceKind) -> Result<&ProvisionedResource> {
        if let LedgerState::Aborted(_) = self.ledger.state() {
            return Err(OperationError::SessionAborted { kind });
        }
        match self.create(kind) {
            Ok(index) => Ok(&self.created[index]),
            Err(error) => {
                self.ledger.mark_aborted();
                Err(error)
            }
        }
    }

    fn create(&mut self, kind: ResourceKind) -> Result<usize> {
        let request = request_for(kind, self.settings, &self.ids)?;
        info!(resource = %request.address, "creating");
        debug!(body = %redacted(&request.body), "request body");

        let resource = self
            .connection
            .provider()
            .create(&request, self.connection.poll())?;
        self.ledger
            .record(DeleteResource::new(request.address, resource.id.clone()));

        info!(resource = %resource.id, "created");
        self.connection.events().resource_created(&resource);
        self.ids.insert(kind, resource.id.clone());
        self.created.push(resource);
        Ok(self.created.len() - 1)
    }

    /// Create the whole chain in dependency order.
    ///
    /// # Errors
    ///
    /// Stops at the first failure and returns it wrapped in
    /// [`OperationError::ProvisioningFailed`]. Later kinds are not attempted.
    pub fn provision_chain(&mut self) -> Result<()> {
        self.provision_kinds(&ResourceKind::CHAIN)
    }

    /// Create `kinds` in the given order.
    ///
    /// # Errors
    ///
    /// Stops at the first failure, as [`ProvisioningSession::provision_chain`] does.
    pub fn provision_kinds(&mut self, kinds: &[ResourceKind]) -> Result<()> {
        for &kind in kinds {
            self.provision(kind)
                .map_err(|source| OperationError::ProvisioningFailed {
                    kind,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    /// Identifier of the resource of `kind` created in this session.
    #[must_use]
    pub fn id(&self, kind: ResourceKind) -> Option<&ResourceId> {
        self.ids.get(&kind)
    }

    #[must_use]
    pub fn ledger_state(&self) -> LedgerState {
        self.ledger.state()
    }

    #[must_use]
    pub fn created(&self) -> &[ProvisionedResource] {
        &self.created
    }

    /// Tear down everything created, newest first, and report.
    #[must_use]
    pub fn finish(self, provisioning: Result<()>) -> RunReport {
        let Self {
            ledger, created, ..
        } = self;
        let cleanup = ledger.finish();
        RunReport {
            created,
            provisioning,
            cleanup,
        }
    }
}

/// Provision the full chain, then delete it in reverse.
#[must_use]
pub fn run<P>(settings: &Settings, connection: Connection<P>) -> RunReport
where
    P: ResourceProvider + ?Sized + 'static,
{
    let mut session = ProvisioningSession::new(settings, connection);
    let provisioning = session.provision_chain();
    session.finish(provisioning)
}
