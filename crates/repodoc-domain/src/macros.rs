//! Common macros for the domain layer.

/// Define a strong-typed UUID identifier for a domain entity.
///
/// Generates a newtype struct wrapping `uuid::Uuid` with `Display`, `FromStr`,
/// `Serialize`, `Deserialize`, and a deterministic constructor so tests can
/// build stable ids without threading randomness through fixtures.
#[macro_export]
macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            derive_more::Display,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[display("{_0}")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Generate a new random UUID v4 identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Derive a deterministic v5 UUID from a human-readable name, scoped
            /// per type so two different id kinds never collide on the same name.
            #[must_use]
            pub fn from_name(name: &str) -> Self {
                let ns =
                    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, stringify!($name).as_bytes());
                Self(uuid::Uuid::new_v5(&ns, name.as_bytes()))
            }

            /// Access the inner [`uuid::Uuid`].
            #[must_use]
            pub fn inner(&self) -> uuid::Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

/// Implement registry infrastructure for a named provider type, backed by a
/// `linkme` distributed slice populated at link time by each implementation's
/// own module.
#[macro_export]
macro_rules! impl_registry {
    (
        provider_trait: $trait:path,
        entry_type: $entry:ident,
        slice_name: $slice:ident,
        resolve_fn: $resolve:ident,
        list_fn: $list:ident
    ) => {
        /// Registry entry for a named provider implementation.
        pub struct $entry {
            /// Unique provider name, matched case-sensitively against requests.
            pub name: &'static str,
            /// Human-readable description shown in listings.
            pub description: &'static str,
            /// Factory constructing the provider instance.
            pub factory: fn() -> std::sync::Arc<dyn $trait>,
        }

        #[linkme::distributed_slice]
        pub static $slice: [$entry] = [..];

        /// Resolve a provider by name from the registry.
        ///
        /// # Errors
        ///
        /// Returns [`$crate::error::Error::ProviderNotFound`] when no entry
        /// matches `name`.
        pub fn $resolve(name: &str) -> $crate::error::Result<std::sync::Arc<dyn $trait>> {
            for entry in $slice {
                if entry.name == name {
                    return Ok((entry.factory)());
                }
            }
            Err($crate::error::Error::ProviderNotFound {
                name: name.to_owned(),
                available: $list().into_iter().map(|(n, _)| n.to_owned()).collect(),
            })
        }

        /// List all registered provider names and descriptions.
        #[must_use]
        pub fn $list() -> Vec<(&'static str, &'static str)> {
            $slice.iter().map(|e| (e.name, e.description)).collect()
        }
    };
}
