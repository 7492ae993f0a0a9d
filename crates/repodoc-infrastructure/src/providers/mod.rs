//! `Provider` implementations: one per supported AI assistant (`spec.md`
//! §4.1). Each submodule registers its entries into
//! [`repodoc_domain::registry::PROVIDERS`] at load time via
//! `linkme::distributed_slice`; importing this module is enough to make
//! every provider resolvable by name.

pub mod cli_provider;
pub mod random_provider;
