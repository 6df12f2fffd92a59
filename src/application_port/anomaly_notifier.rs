use crate::domain_model::*;

/// Told when a valid refresh secret shows up from a different address than
/// the one it was bound to.
#[async_trait::async_trait]
pub trait AnomalyNotifier: Send + Sync {
    async fn notify(
        &self,
        subject: SubjectId,
        old_ip: &BindingIp,
        new_ip: &BindingIp,
    ) -> anyhow::Result<()>;
}
