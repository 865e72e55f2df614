//! `rentops-products` — rentable servers and services.

pub mod product;

pub use product::{
    Availability, ProductCommand, ProductEvent, ProductId, ProductKind, RentalProduct,
    ServerSpecs,
};
