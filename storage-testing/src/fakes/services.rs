use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use storage_contracts::{
    DependentService, ServiceActionReport, ServiceFailure, ServiceOpsAdapter, StorageError,
};

use super::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Dependents { mount_point: String },
    Stop { names: Vec<String> },
    Start { names: Vec<String> },
}

/// Service manager; services can be told to refuse stopping or starting
#[derive(Default)]
pub struct FakeServices {
    services: Mutex<Vec<DependentService>>,
    refuse_stop: Mutex<HashMap<String, String>>,
    refuse_start: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<ServiceCall>>,
}

impl FakeServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_services(services: &[(&str, bool)]) -> Self {
        let fake = Self::default();
        for (name, running) in services {
            fake.add_service(name, *running);
        }
        fake
    }

    pub fn add_service(&self, name: &str, running: bool) {
        lock(&self.services).push(DependentService {
            name: name.to_string(),
            display_name: None,
            running,
        });
    }

    pub fn refuse_stop(&self, name: &str, message: &str) {
        lock(&self.refuse_stop).insert(name.to_string(), message.to_string());
    }

    pub fn refuse_start(&self, name: &str, message: &str) {
        lock(&self.refuse_start).insert(name.to_string(), message.to_string());
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        lock(&self.calls).clone()
    }

    pub fn is_running(&self, name: &str) -> bool {
        lock(&self.services)
            .iter()
            .any(|service| service.name == name && service.running)
    }

    fn apply(
        &self,
        names: &[String],
        running: bool,
        refusals: &Mutex<HashMap<String, String>>,
    ) -> ServiceActionReport {
        let refusals = lock(refusals);
        let mut services = lock(&self.services);
        let mut report = ServiceActionReport::default();
        for name in names {
            if let Some(message) = refusals.get(name) {
                report.failed.push(ServiceFailure {
                    name: name.clone(),
                    message: message.clone(),
                });
                continue;
            }
            if let Some(service) = services.iter_mut().find(|s| &s.name == name) {
                service.running = running;
            }
            report.succeeded.push(name.clone());
        }
        report
    }
}

#[async_trait]
impl ServiceOpsAdapter for FakeServices {
    async fn dependent_services(
        &self,
        mount_point: &str,
    ) -> Result<Vec<DependentService>, StorageError> {
        lock(&self.calls).push(ServiceCall::Dependents {
            mount_point: mount_point.to_string(),
        });
        Ok(lock(&self.services).clone())
    }

    async fn stop_services(&self, names: &[String]) -> Result<ServiceActionReport, StorageError> {
        lock(&self.calls).push(ServiceCall::Stop {
            names: names.to_vec(),
        });
        Ok(self.apply(names, false, &self.refuse_stop))
    }

    async fn start_services(&self, names: &[String]) -> Result<ServiceActionReport, StorageError> {
        lock(&self.calls).push(ServiceCall::Start {
            names: names.to_vec(),
        });
        Ok(self.apply(names, true, &self.refuse_start))
    }
}
