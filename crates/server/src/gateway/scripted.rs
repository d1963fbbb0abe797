//! In-process gateway with scripted answers, for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use storeforge_core::{DnsRecord, DnsRecordType, Hostname};

use super::{
    Diagnostics, DomainGateway, GatewayError, RegisteredDomain, VerificationReport, routing_record,
};

/// How the fake answers a verification check for one hostname.
#[derive(Debug, Clone)]
pub enum ScriptedCheck {
    /// Report the domain as verified.
    Verified,
    /// Report the domain as not verified with these diagnostics.
    Unverified(Diagnostics),
    /// Fail the call with this error.
    Fail(GatewayError),
    /// Never answer. Pair with a timeout.
    Hang,
    /// Answer after a delay.
    Delayed(Duration, Box<ScriptedCheck>),
}

impl Default for ScriptedCheck {
    fn default() -> Self {
        Self::Unverified(Diagnostics {
            propagation_pending: true,
            ..Diagnostics::default()
        })
    }
}

#[derive(Debug, Default)]
struct Script {
    registered: HashSet<Hostname>,
    checks: HashMap<Hostname, ScriptedCheck>,
    default_check: ScriptedCheck,
    register_failures: HashMap<Hostname, GatewayError>,
    deregister_failure: Option<GatewayError>,
    register_calls: usize,
    check_calls: HashMap<Hostname, usize>,
    deregister_calls: usize,
}

/// A [`DomainGateway`] whose answers are set up by the test.
///
/// Registration succeeds unless a failure was scripted for the hostname, and
/// records the hostname as registered. Checks on unregistered hostnames fail
/// with [`GatewayError::NotFound`]. Cloning shares the script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
    record_ttl: u32,
}

impl ScriptedGateway {
    /// Create a gateway where every check reports "not verified yet".
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Arc::default(),
            record_ttl: 3600,
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script the answer for checks on `hostname`.
    pub fn set_check(&self, hostname: &str, check: ScriptedCheck) {
        if let Ok(hostname) = Hostname::parse(hostname) {
            self.script().checks.insert(hostname, check);
        }
    }

    /// Script the answer for hostnames without their own script.
    pub fn set_default_check(&self, check: ScriptedCheck) {
        self.script().default_check = check;
    }

    /// Make registering `hostname` fail with `error`.
    pub fn fail_register(&self, hostname: &str, error: GatewayError) {
        if let Ok(hostname) = Hostname::parse(hostname) {
            self.script().register_failures.insert(hostname, error);
        }
    }

    /// Make every deregistration fail with `error`.
    pub fn fail_deregister(&self, error: GatewayError) {
        self.script().deregister_failure = Some(error);
    }

    /// Mark `hostname` as registered without going through `register_domain`.
    pub fn mark_registered(&self, hostname: &Hostname) {
        self.script().registered.insert(hostname.clone());
    }

    /// Whether the provider currently holds `hostname`.
    #[must_use]
    pub fn is_registered(&self, hostname: &str) -> bool {
        Hostname::parse(hostname).is_ok_and(|h| self.script().registered.contains(&h))
    }

    /// Number of `register_domain` calls.
    #[must_use]
    pub fn register_calls(&self) -> usize {
        self.script().register_calls
    }

    /// Number of `fetch_verification_status` calls for `hostname`.
    #[must_use]
    pub fn check_calls(&self, hostname: &str) -> usize {
        Hostname::parse(hostname)
            .ok()
            .and_then(|h| self.script().check_calls.get(&h).copied())
            .unwrap_or_default()
    }

    /// Number of `deregister_domain` calls.
    #[must_use]
    pub fn deregister_calls(&self) -> usize {
        self.script().deregister_calls
    }

    fn requirements(&self, hostname: &Hostname) -> Vec<DnsRecord> {
        vec![
            routing_record(hostname, hostname.apex(), self.record_ttl),
            DnsRecord::new(
                DnsRecordType::Txt,
                "_vercel",
                format!("vc-domain-verify={hostname}"),
                self.record_ttl,
            ),
        ]
    }
}

async fn answer(check: ScriptedCheck) -> Result<VerificationReport, GatewayError> {
    let mut check = check;
    loop {
        match check {
            ScriptedCheck::Verified => return Ok(VerificationReport::verified()),
            ScriptedCheck::Unverified(diagnostics) => {
                return Ok(VerificationReport::unverified(diagnostics));
            }
            ScriptedCheck::Fail(error) => return Err(error),
            ScriptedCheck::Hang => std::future::pending::<()>().await,
            ScriptedCheck::Delayed(delay, next) => {
                tokio::time::sleep(delay).await;
                check = *next;
            }
        }
    }
}

#[async_trait]
impl DomainGateway for ScriptedGateway {
    async fn register_domain(&self, hostname: &Hostname) -> Result<RegisteredDomain, GatewayError> {
        let mut script = self.script();
        script.register_calls += 1;

        if let Some(error) = script.register_failures.get(hostname) {
            return Err(error.clone());
        }
        script.registered.insert(hostname.clone());
        drop(script);

        Ok(RegisteredDomain {
            provider_domain_id: hostname.to_string(),
            dns_requirements: self.requirements(hostname),
        })
    }

    async fn fetch_requirements(&self, hostname: &Hostname) -> Result<Vec<DnsRecord>, GatewayError> {
        if !self.script().registered.contains(hostname) {
            return Err(GatewayError::NotFound);
        }
        Ok(self.requirements(hostname))
    }

    async fn fetch_verification_status(
        &self,
        hostname: &Hostname,
    ) -> Result<VerificationReport, GatewayError> {
        let check = {
            let mut script = self.script();
            *script.check_calls.entry(hostname.clone()).or_default() += 1;

            if !script.registered.contains(hostname) {
                return Err(GatewayError::NotFound);
            }
            script
                .checks
                .get(hostname)
                .unwrap_or(&script.default_check)
                .clone()
        };

        answer(check).await
    }

    async fn deregister_domain(&self, hostname: &Hostname) -> Result<(), GatewayError> {
        let mut script = self.script();
        script.deregister_calls += 1;

        if let Some(error) = &script.deregister_failure {
            return Err(error.clone());
        }
        script.registered.remove(hostname);
        Ok(())
    }
}
