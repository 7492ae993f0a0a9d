//! The compile-time Provider registry (`spec.md` §4.1 registry note).
//!
//! Each infrastructure-layer provider implementation registers itself into
//! [`PROVIDERS`] with [`linkme::distributed_slice`]; this crate only defines
//! the slice and the lookup/listing functions.

use crate::ports::provider::Provider;

crate::impl_registry! {
    provider_trait: Provider,
    entry_type: ProviderRegistryEntry,
    slice_name: PROVIDERS,
    resolve_fn: resolve_provider,
    list_fn: list_providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn unknown_provider_name_is_a_specific_error() {
        let err = resolve_provider("does-not-exist").expect_err("should fail");
        match err {
            Error::ProviderNotFound { name, .. } => assert_eq!(name, "does-not-exist"),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
