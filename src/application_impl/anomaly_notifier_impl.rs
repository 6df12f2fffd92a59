use crate::application_port::*;
use crate::domain_model::*;
use tracing::warn;

/// Reports binding-IP changes as structured warnings. Stands in for a mail
/// or webhook delivery until one is wired up.
#[derive(Debug, Default)]
pub struct LogAnomalyNotifier;

impl LogAnomalyNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl AnomalyNotifier for LogAnomalyNotifier {
    async fn notify(
        &self,
        subject: SubjectId,
        old_ip: &BindingIp,
        new_ip: &BindingIp,
    ) -> anyhow::Result<()> {
        warn!(
            %subject,
            %old_ip,
            %new_ip,
            "IP address change detected on refresh, security warning sent"
        );
        Ok(())
    }
}
