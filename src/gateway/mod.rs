//! Payment-authorization gateway interface.
//!
//! The engine only depends on the gateway's three-verb contract: open a
//! hold, capture it, cancel it. The surrounding platform wires a concrete
//! client behind [`PaymentGateway`].

use serde::{Deserialize, Serialize};

use crate::errors::GatewayResult;

/// Opaque handle to a gateway-side authorization hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationId(String);

impl AuthorizationId {
    /// Wraps a gateway-issued handle.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AuthorizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Customer reference forwarded to the gateway when opening a hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRef {
    /// Customer email.
    pub email: String,
    /// Customer display name.
    pub name:  String,
}

/// Outcome of a capture attempt. A decline is a normal business outcome,
/// not a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The held funds were transferred.
    Captured,
    /// The gateway refused the capture.
    Declined,
}

/// Three-verb payment gateway contract.
pub trait PaymentGateway: Send + Sync {
    /// Reserves `amount` against the customer's payment method.
    fn authorize(&self, amount: u64, customer: &CustomerRef) -> GatewayResult<AuthorizationId>;

    /// Converts a held authorization into a funds transfer.
    fn capture(&self, authorization: &AuthorizationId) -> GatewayResult<CaptureOutcome>;

    /// Releases a held authorization without transferring funds.
    fn cancel(&self, authorization: &AuthorizationId) -> GatewayResult<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted gateway double used by the crate's test suites.

    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicU64, Ordering},
            Mutex,
        },
    };

    use super::{AuthorizationId, CaptureOutcome, CustomerRef, PaymentGateway};
    use crate::errors::{GatewayError, GatewayResult};

    /// Scripted response for a capture attempt.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum CaptureScript {
        Succeed,
        Decline,
        Error,
    }

    /// One recorded gateway interaction.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum GatewayCall {
        Authorize { amount: u64, email: String },
        Capture(String),
        Cancel(String),
    }

    /// In-memory gateway with per-authorization capture scripts and a call
    /// journal.
    #[derive(Default)]
    pub struct ScriptedGateway {
        scripts:       Mutex<HashMap<String, CaptureScript>>,
        cancel_errors: Mutex<std::collections::HashSet<String>>,
        journal:       Mutex<Vec<GatewayCall>>,
        counter:       AtomicU64,
    }

    impl ScriptedGateway {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sets the capture outcome for an authorization. Unscripted
        /// authorizations capture successfully.
        pub fn script_capture(&self, authorization: &AuthorizationId, script: CaptureScript) {
            self.scripts
                .lock()
                .expect("gateway scripts lock")
                .insert(authorization.as_str().to_string(), script);
        }

        /// Makes the next cancel call for an authorization fail.
        pub fn script_cancel_error(&self, authorization: &AuthorizationId) {
            self.cancel_errors
                .lock()
                .expect("gateway cancel lock")
                .insert(authorization.as_str().to_string());
        }

        pub fn calls(&self) -> Vec<GatewayCall> {
            self.journal.lock().expect("gateway journal lock").clone()
        }

        pub fn cancelled(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    GatewayCall::Cancel(id) => Some(id),
                    _ => None,
                })
                .collect()
        }

        pub fn capture_attempts(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    GatewayCall::Capture(id) => Some(id),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: GatewayCall) {
            self.journal.lock().expect("gateway journal lock").push(call);
        }
    }

    impl PaymentGateway for ScriptedGateway {
        fn authorize(&self, amount: u64, customer: &CustomerRef) -> GatewayResult<AuthorizationId> {
            let seq = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            self.record(GatewayCall::Authorize { amount, email: customer.email.clone() });
            Ok(AuthorizationId::new(format!("auth-{}", seq)))
        }

        fn capture(&self, authorization: &AuthorizationId) -> GatewayResult<CaptureOutcome> {
            self.record(GatewayCall::Capture(authorization.as_str().to_string()));
            let script = self
                .scripts
                .lock()
                .expect("gateway scripts lock")
                .get(authorization.as_str())
                .copied()
                .unwrap_or(CaptureScript::Succeed);
            match script {
                CaptureScript::Succeed => Ok(CaptureOutcome::Captured),
                CaptureScript::Decline => Ok(CaptureOutcome::Declined),
                CaptureScript::Error => {
                    Err(GatewayError::Unavailable("scripted outage".to_string()))
                },
            }
        }

        fn cancel(&self, authorization: &AuthorizationId) -> GatewayResult<()> {
            self.record(GatewayCall::Cancel(authorization.as_str().to_string()));
            let fails = self
                .cancel_errors
                .lock()
                .expect("gateway cancel lock")
                .remove(authorization.as_str());
            if fails {
                return Err(GatewayError::Unavailable("scripted cancel outage".to_string()));
            }
            Ok(())
        }
    }
}
