// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use crate::{DependentService, ServiceActionReport, StorageError};

#[async_trait]
pub trait ServiceOpsAdapter: Send + Sync {
    /// Services that read from or write to `mount_point`
    async fn dependent_services(
        &self,
        mount_point: &str,
    ) -> Result<Vec<DependentService>, StorageError>;

    async fn stop_services(&self, names: &[String]) -> Result<ServiceActionReport, StorageError>;

    async fn start_services(&self, names: &[String]) -> Result<ServiceActionReport, StorageError>;
}
