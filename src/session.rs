use crate::{
    error::AppResult,
    models::{ManagedObjectReference, ObjectContent},
};

/// What the dump needs from an authenticated connection to an ESXi host or vCenter.
pub(crate) trait Session {
    /// True for a vCenter server, false for a standalone host.
    fn is_vcenter(&self) -> bool;

    /// The performance manager advertised in the service content.
    fn perf_manager(&self) -> Option<&ManagedObjectReference>;

    /// Fetch the properties named in `props` of a single managed object, or all of them when
    /// `props` is empty.
    async fn retrieve_one(
        &self,
        obj: &ManagedObjectReference,
        props: &[&str],
    ) -> AppResult<ObjectContent>;

    async fn logout(&self) -> AppResult<()>;
}
