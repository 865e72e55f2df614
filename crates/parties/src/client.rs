use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use rentops_core::{Aggregate, AggregateRoot, DomainError, RecordId};
use rentops_events::Event;

/// Client identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub RecordId);

impl ClientId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ClientId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Client status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Active,
    Suspended,
}

/// Contact information for a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: Client.
///
/// Carries contact data plus the rental-client flag with its since-date and
/// free-form rental notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    id: ClientId,
    name: String,
    contact: ContactInfo,
    status: ClientStatus,
    rental_client_since: Option<NaiveDate>,
    notes: Option<String>,
    version: u64,
    created: bool,
}

impl Client {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ClientId) -> Self {
        Self {
            id,
            name: String::new(),
            contact: ContactInfo::default(),
            status: ClientStatus::Active,
            rental_client_since: None,
            notes: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ClientId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn status(&self) -> ClientStatus {
        self.status
    }

    pub fn is_rental_client(&self) -> bool {
        self.rental_client_since.is_some()
    }

    pub fn rental_client_since(&self) -> Option<NaiveDate> {
        self.rental_client_since
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Suspended clients cannot sign new contracts.
    pub fn can_contract(&self) -> bool {
        self.status == ClientStatus::Active
    }
}

impl AggregateRoot for Client {
    type Id = ClientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterClient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterClient {
    pub client_id: ClientId,
    pub name: String,
    pub contact: ContactInfo,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateContact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateContact {
    pub client_id: ClientId,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkRentalClient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkRentalClient {
    pub client_id: ClientId,
    pub since: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SuspendClient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendClient {
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReinstateClient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReinstateClient {
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientCommand {
    RegisterClient(RegisterClient),
    UpdateContact(UpdateContact),
    MarkRentalClient(MarkRentalClient),
    SuspendClient(SuspendClient),
    ReinstateClient(ReinstateClient),
}

/// Event: ClientRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistered {
    pub client_id: ClientId,
    pub name: String,
    pub contact: ContactInfo,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientContactUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContactUpdated {
    pub client_id: ClientId,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientMarkedRental.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMarkedRental {
    pub client_id: ClientId,
    pub since: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientSuspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSuspended {
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientReinstated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientReinstated {
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    ClientRegistered(ClientRegistered),
    ClientContactUpdated(ClientContactUpdated),
    ClientMarkedRental(ClientMarkedRental),
    ClientSuspended(ClientSuspended),
    ClientReinstated(ClientReinstated),
}

impl Event for ClientEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::ClientRegistered(_) => "parties.client.registered",
            ClientEvent::ClientContactUpdated(_) => "parties.client.contact_updated",
            ClientEvent::ClientMarkedRental(_) => "parties.client.marked_rental",
            ClientEvent::ClientSuspended(_) => "parties.client.suspended",
            ClientEvent::ClientReinstated(_) => "parties.client.reinstated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ClientEvent::ClientRegistered(e) => e.occurred_at,
            ClientEvent::ClientContactUpdated(e) => e.occurred_at,
            ClientEvent::ClientMarkedRental(e) => e.occurred_at,
            ClientEvent::ClientSuspended(e) => e.occurred_at,
            ClientEvent::ClientReinstated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Client {
    type Command = ClientCommand;
    type Event = ClientEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ClientEvent::ClientRegistered(e) => {
                self.id = e.client_id;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.notes = e.notes.clone();
                self.status = ClientStatus::Active;
                self.created = true;
            }
            ClientEvent::ClientContactUpdated(e) => {
                self.contact = e.contact.clone();
            }
            ClientEvent::ClientMarkedRental(e) => {
                self.rental_client_since = Some(e.since);
            }
            ClientEvent::ClientSuspended(_) => {
                self.status = ClientStatus::Suspended;
            }
            ClientEvent::ClientReinstated(_) => {
                self.status = ClientStatus::Active;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ClientCommand::RegisterClient(cmd) => self.handle_register(cmd),
            ClientCommand::UpdateContact(cmd) => self.handle_update_contact(cmd),
            ClientCommand::MarkRentalClient(cmd) => self.handle_mark_rental(cmd),
            ClientCommand::SuspendClient(cmd) => self.handle_suspend(cmd),
            ClientCommand::ReinstateClient(cmd) => self.handle_reinstate(cmd),
        }
    }
}

impl Client {
    fn ensure_client_id(&self, client_id: ClientId) -> Result<(), DomainError> {
        if self.id != client_id {
            return Err(DomainError::invariant("client_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterClient) -> Result<Vec<ClientEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("client already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("client name cannot be empty"));
        }

        Ok(vec![ClientEvent::ClientRegistered(ClientRegistered {
            client_id: cmd.client_id,
            name: cmd.name.clone(),
            contact: cmd.contact.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_contact(
        &self,
        cmd: &UpdateContact,
    ) -> Result<Vec<ClientEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_client_id(cmd.client_id)?;

        Ok(vec![ClientEvent::ClientContactUpdated(
            ClientContactUpdated {
                client_id: cmd.client_id,
                contact: cmd.contact.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_mark_rental(
        &self,
        cmd: &MarkRentalClient,
    ) -> Result<Vec<ClientEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_client_id(cmd.client_id)?;

        if self.rental_client_since.is_some() {
            return Err(DomainError::conflict("client is already a rental client"));
        }

        Ok(vec![ClientEvent::ClientMarkedRental(ClientMarkedRental {
            client_id: cmd.client_id,
            since: cmd.since,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendClient) -> Result<Vec<ClientEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_client_id(cmd.client_id)?;

        if self.status == ClientStatus::Suspended {
            return Err(DomainError::conflict("client is already suspended"));
        }

        Ok(vec![ClientEvent::ClientSuspended(ClientSuspended {
            client_id: cmd.client_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reinstate(&self, cmd: &ReinstateClient) -> Result<Vec<ClientEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_client_id(cmd.client_id)?;

        if self.status == ClientStatus::Active {
            return Err(DomainError::conflict("client is not suspended"));
        }

        Ok(vec![ClientEvent::ClientReinstated(ClientReinstated {
            client_id: cmd.client_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
