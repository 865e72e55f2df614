use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentops_core::{Aggregate, AggregateRoot, DomainError, Money, RecordId};
use rentops_events::Event;

/// Rental product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub RecordId);

impl ProductId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What kind of rentable item this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Server,
    Service,
}

/// Hardware specs carried by server products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpecs {
    pub cpu_count: u32,
    pub ram_gb: u32,
    pub disk_gb: u32,
}

/// Availability lifecycle of a rentable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Rented,
    Maintenance,
}

/// Aggregate root: RentalProduct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalProduct {
    id: ProductId,
    name: String,
    kind: ProductKind,
    /// Monthly rental price in smallest currency unit.
    monthly_price: Money,
    specs: Option<ServerSpecs>,
    availability: Availability,
    version: u64,
    created: bool,
}

impl RentalProduct {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            name: String::new(),
            kind: ProductKind::Service,
            monthly_price: Money::ZERO,
            specs: None,
            availability: Availability::Available,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    pub fn monthly_price(&self) -> Money {
        self.monthly_price
    }

    pub fn specs(&self) -> Option<&ServerSpecs> {
        self.specs.as_ref()
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    /// Display name; servers are labeled from their specs.
    pub fn display_name(&self) -> String {
        match (self.kind, &self.specs) {
            (ProductKind::Server, Some(s)) => {
                format!("Server {} CPU, {} GB RAM", s.cpu_count, s.ram_gb)
            }
            _ => self.name.clone(),
        }
    }

    /// Only available items can be put on a new contract.
    pub fn can_be_rented(&self) -> bool {
        self.availability == Availability::Available
    }
}

impl AggregateRoot for RentalProduct {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProduct {
    pub product_id: ProductId,
    pub name: String,
    pub kind: ProductKind,
    pub monthly_price: Money,
    pub specs: Option<ServerSpecs>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RentOut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentOut {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReturnProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartMaintenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartMaintenance {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    RegisterProduct(RegisterProduct),
    RentOut(RentOut),
    ReturnProduct(ReturnProduct),
    StartMaintenance(StartMaintenance),
}

/// Event: ProductRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRegistered {
    pub product_id: ProductId,
    pub name: String,
    pub kind: ProductKind,
    pub monthly_price: Money,
    pub specs: Option<ServerSpecs>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductRentedOut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRentedOut {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductReturned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReturned {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductSentToMaintenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSentToMaintenance {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductRegistered(ProductRegistered),
    ProductRentedOut(ProductRentedOut),
    ProductReturned(ProductReturned),
    ProductSentToMaintenance(ProductSentToMaintenance),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductRegistered(_) => "products.product.registered",
            ProductEvent::ProductRentedOut(_) => "products.product.rented_out",
            ProductEvent::ProductReturned(_) => "products.product.returned",
            ProductEvent::ProductSentToMaintenance(_) => "products.product.sent_to_maintenance",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductRegistered(e) => e.occurred_at,
            ProductEvent::ProductRentedOut(e) => e.occurred_at,
            ProductEvent::ProductReturned(e) => e.occurred_at,
            ProductEvent::ProductSentToMaintenance(e) => e.occurred_at,
        }
    }
}

impl Aggregate for RentalProduct {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductRegistered(e) => {
                self.id = e.product_id;
                self.name = e.name.clone();
                self.kind = e.kind;
                self.monthly_price = e.monthly_price;
                self.specs = e.specs;
                self.availability = Availability::Available;
                self.created = true;
            }
            ProductEvent::ProductRentedOut(_) => {
                self.availability = Availability::Rented;
            }
            ProductEvent::ProductReturned(_) => {
                self.availability = Availability::Available;
            }
            ProductEvent::ProductSentToMaintenance(_) => {
                self.availability = Availability::Maintenance;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::RegisterProduct(cmd) => self.handle_register(cmd),
            ProductCommand::RentOut(cmd) => self.handle_rent_out(cmd),
            ProductCommand::ReturnProduct(cmd) => self.handle_return(cmd),
            ProductCommand::StartMaintenance(cmd) => self.handle_start_maintenance(cmd),
        }
    }
}

impl RentalProduct {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        if !cmd.monthly_price.is_positive() {
            return Err(DomainError::validation("price must be positive"));
        }

        // Servers may leave the name empty; it is derived from specs.
        let name = if cmd.name.trim().is_empty() {
            match (cmd.kind, &cmd.specs) {
                (ProductKind::Server, Some(s)) => {
                    format!("Server {} CPU, {} GB RAM", s.cpu_count, s.ram_gb)
                }
                _ => return Err(DomainError::validation("product name cannot be empty")),
            }
        } else {
            cmd.name.clone()
        };

        Ok(vec![ProductEvent::ProductRegistered(ProductRegistered {
            product_id: cmd.product_id,
            name,
            kind: cmd.kind,
            monthly_price: cmd.monthly_price,
            specs: cmd.specs,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rent_out(&self, cmd: &RentOut) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        match self.availability {
            Availability::Available => Ok(vec![ProductEvent::ProductRentedOut(ProductRentedOut {
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })]),
            Availability::Rented => Err(DomainError::conflict("product is already rented")),
            Availability::Maintenance => Err(DomainError::invariant(
                "product under maintenance cannot be rented",
            )),
        }
    }

    fn handle_return(&self, cmd: &ReturnProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if self.availability == Availability::Available {
            return Err(DomainError::conflict("product is already available"));
        }

        Ok(vec![ProductEvent::ProductReturned(ProductReturned {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_maintenance(
        &self,
        cmd: &StartMaintenance,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if self.availability == Availability::Maintenance {
            return Err(DomainError::conflict("product is already under maintenance"));
        }

        Ok(vec![ProductEvent::ProductSentToMaintenance(
            ProductSentToMaintenance {
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_product_id() -> ProductId {
        ProductId::new(RecordId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn register_cmd(id: ProductId) -> RegisterProduct {
        RegisterProduct {
            product_id: id,
            name: "Test Server".to_string(),
            kind: ProductKind::Server,
            monthly_price: Money::from_cents(100_000),
            specs: Some(ServerSpecs {
                cpu_count: 4,
                ram_gb: 16,
                disk_gb: 500,
            }),
            occurred_at: test_time(),
        }
    }

    fn registered_product() -> RentalProduct {
        let mut product = RentalProduct::empty(test_product_id());
        let cmd = register_cmd(product.id_typed());
        let events = product
            .handle(&ProductCommand::RegisterProduct(cmd))
            .unwrap();
        product.apply(&events[0]);
        product
    }

    #[test]
    fn register_product_emits_product_registered_event() {
        let product = RentalProduct::empty(test_product_id());
        let product_id = product.id_typed();
        let events = product
            .handle(&ProductCommand::RegisterProduct(register_cmd(product_id)))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            ProductEvent::ProductRegistered(e) => {
                assert_eq!(e.product_id, product_id);
                assert_eq!(e.name, "Test Server");
                assert_eq!(e.monthly_price, Money::from_cents(100_000));
            }
            _ => panic!("Expected ProductRegistered event"),
        }
    }

    #[test]
    fn register_product_rejects_non_positive_price() {
        let product = RentalProduct::empty(test_product_id());
        let mut cmd = register_cmd(product.id_typed());
        cmd.monthly_price = Money::ZERO;

        let err = product
            .handle(&ProductCommand::RegisterProduct(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn server_name_is_derived_from_specs_when_blank() {
        let product = RentalProduct::empty(test_product_id());
        let mut cmd = register_cmd(product.id_typed());
        cmd.name = String::new();

        let events = product
            .handle(&ProductCommand::RegisterProduct(cmd))
            .unwrap();
        match &events[0] {
            ProductEvent::ProductRegistered(e) => {
                assert_eq!(e.name, "Server 4 CPU, 16 GB RAM");
            }
            _ => panic!("Expected ProductRegistered event"),
        }
    }

    #[test]
    fn nameless_service_is_rejected() {
        let product = RentalProduct::empty(test_product_id());
        let cmd = RegisterProduct {
            product_id: product.id_typed(),
            name: "  ".to_string(),
            kind: ProductKind::Service,
            monthly_price: Money::from_cents(50_000),
            specs: None,
            occurred_at: test_time(),
        };

        let err = product
            .handle(&ProductCommand::RegisterProduct(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rent_out_and_return_cycle() {
        let mut product = registered_product();
        assert!(product.can_be_rented());

        let cmd = RentOut {
            product_id: product.id_typed(),
            occurred_at: test_time(),
        };
        let events = product.handle(&ProductCommand::RentOut(cmd.clone())).unwrap();
        product.apply(&events[0]);
        assert_eq!(product.availability(), Availability::Rented);
        assert!(!product.can_be_rented());

        // Renting twice is a conflict.
        let err = product.handle(&ProductCommand::RentOut(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let cmd = ReturnProduct {
            product_id: product.id_typed(),
            occurred_at: test_time(),
        };
        let events = product.handle(&ProductCommand::ReturnProduct(cmd)).unwrap();
        product.apply(&events[0]);
        assert_eq!(product.availability(), Availability::Available);
    }

    #[test]
    fn maintenance_blocks_renting() {
        let mut product = registered_product();
        let cmd = StartMaintenance {
            product_id: product.id_typed(),
            occurred_at: test_time(),
        };
        let events = product
            .handle(&ProductCommand::StartMaintenance(cmd))
            .unwrap();
        product.apply(&events[0]);
        assert_eq!(product.availability(), Availability::Maintenance);

        let cmd = RentOut {
            product_id: product.id_typed(),
            occurred_at: test_time(),
        };
        let err = product.handle(&ProductCommand::RentOut(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: handle is deterministic (same state + command = same events).
            #[test]
            fn handle_is_deterministic(
                name in "[A-Za-z][A-Za-z0-9 ]{0,40}",
                price in 1i64..10_000_000,
            ) {
                let product = RentalProduct::empty(test_product_id());
                let cmd = RegisterProduct {
                    product_id: product.id_typed(),
                    name,
                    kind: ProductKind::Service,
                    monthly_price: Money::from_cents(price),
                    specs: None,
                    occurred_at: test_time(),
                };

                let a = product.handle(&ProductCommand::RegisterProduct(cmd.clone())).unwrap();
                let b = product.handle(&ProductCommand::RegisterProduct(cmd)).unwrap();
                prop_assert_eq!(a, b);
            }

            /// Property: non-positive prices are always rejected.
            #[test]
            fn non_positive_price_always_rejected(price in -10_000_000i64..=0) {
                let product = RentalProduct::empty(test_product_id());
                let cmd = RegisterProduct {
                    product_id: product.id_typed(),
                    name: "Backup Service".to_string(),
                    kind: ProductKind::Service,
                    monthly_price: Money::from_cents(price),
                    specs: None,
                    occurred_at: test_time(),
                };

                let err = product.handle(&ProductCommand::RegisterProduct(cmd)).unwrap_err();
                prop_assert!(matches!(err, DomainError::Validation(_)));
            }
        }
    }
}
