//! `rentops-parties` — clients of the rental business.

pub mod client;

pub use client::{
    Client, ClientCommand, ClientEvent, ClientId, ClientStatus, ContactInfo,
};
