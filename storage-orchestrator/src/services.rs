// SPDX-License-Identifier: GPL-3.0-only

//! Dependent services around the shared primary mount point
//!
//! Before unmounting: stop running services with operator consent, and ask
//! again before forcing the unmount when some refused to stop. After
//! mounting: offer to start the services that are stopped.

use std::sync::Arc;

use storage_contracts::{
    ConfirmRequest, ConfirmTone, DependentService, ServiceFailure, ServiceOpsAdapter,
};

use crate::error::Result;
use crate::operator::Operator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceClearance {
    /// Nothing depends on the mount point
    NoneRunning,
    /// Operator agreed and every service stopped
    Stopped(Vec<String>),
    /// Some services kept running; operator chose to unmount anyway
    Forced {
        stopped: Vec<String>,
        failed: Vec<ServiceFailure>,
    },
    Declined,
}

fn names(services: &[DependentService]) -> Vec<String> {
    services.iter().map(|s| s.name.clone()).collect()
}

fn labels(services: &[DependentService]) -> String {
    services
        .iter()
        .map(DependentService::label)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone)]
pub struct ServiceCoordinator {
    services: Arc<dyn ServiceOpsAdapter>,
    operator: Operator,
}

impl ServiceCoordinator {
    pub fn new(services: Arc<dyn ServiceOpsAdapter>, operator: Operator) -> Self {
        Self { services, operator }
    }

    pub async fn clear_for_unmount(&self, mount_point: &str) -> Result<ServiceClearance> {
        let running: Vec<DependentService> = self
            .services
            .dependent_services(mount_point)
            .await?
            .into_iter()
            .filter(|service| service.running)
            .collect();

        if running.is_empty() {
            return Ok(ServiceClearance::NoneRunning);
        }

        tracing::info!(mount_point, count = running.len(), "dependent services running");
        let request = ConfirmRequest::new(
            "Stop dependent services",
            format!(
                "{} use {mount_point}: {}. Stop them and unmount?",
                plural(running.len()),
                labels(&running)
            ),
        );
        if !self.operator.approve(request).await {
            return Ok(ServiceClearance::Declined);
        }

        let report = self.services.stop_services(&names(&running)).await?;
        if report.all_succeeded() {
            return Ok(ServiceClearance::Stopped(report.succeeded));
        }

        for failure in &report.failed {
            tracing::warn!(service = %failure.name, message = %failure.message, "service did not stop");
            self.operator
                .warning(format!("{} did not stop: {}", failure.name, failure.message));
        }

        let failed_names = report
            .failed
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let request = ConfirmRequest::new(
            "Force unmount",
            format!("{failed_names} still running on {mount_point}. Force unmount anyway?"),
        )
        .tone(ConfirmTone::HighRisk);
        if !self.operator.approve(request).await {
            return Ok(ServiceClearance::Declined);
        }

        Ok(ServiceClearance::Forced {
            stopped: report.succeeded,
            failed: report.failed,
        })
    }

    /// Offer to start stopped services; failures only warn
    pub async fn restore_after_mount(&self, mount_point: &str) -> Vec<String> {
        let stopped: Vec<DependentService> = match self.services.dependent_services(mount_point).await
        {
            Ok(services) => services.into_iter().filter(|s| !s.running).collect(),
            Err(err) => {
                tracing::warn!(mount_point, error = %err, "could not list dependent services");
                self.operator
                    .warning(format!("Could not check services for {mount_point}: {}", err.message));
                return Vec::new();
            }
        };
        if stopped.is_empty() {
            return Vec::new();
        }

        let request = ConfirmRequest::new(
            "Start dependent services",
            format!(
                "{} on {mount_point} are stopped: {}. Start them now?",
                plural(stopped.len()),
                labels(&stopped)
            ),
        );
        if !self.operator.approve(request).await {
            return Vec::new();
        }

        match self.services.start_services(&names(&stopped)).await {
            Ok(report) => {
                for failure in &report.failed {
                    self.operator
                        .warning(format!("{} did not start: {}", failure.name, failure.message));
                }
                if !report.succeeded.is_empty() {
                    self.operator
                        .success(format!("Started {}", report.succeeded.join(", ")));
                }
                report.succeeded
            }
            Err(err) => {
                tracing::warn!(mount_point, error = %err, "starting dependent services failed");
                self.operator
                    .warning(format!("Could not start services: {}", err.message));
                Vec::new()
            }
        }
    }
}

fn plural(count: usize) -> String {
    if count == 1 {
        "1 service".to_string()
    } else {
        format!("{count} services")
    }
}
