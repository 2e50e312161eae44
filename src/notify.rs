//! Notification dispatch.
//!
//! Flows decide when a message is owed and hand a [`Notification`] to the
//! configured [`Notifier`]. How it reaches the recipient is the notifier's
//! business. Dispatch happens after the surrounding transaction commits, so a
//! rolled-back registration never sends mail.

use crate::tenant::{PrincipalId, TenantId};
use log::{info, warn};
use std::sync::{Arc, Mutex};

/// A message owed to a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Confirm ownership of the e-mail address.
    VerifyEmail {
        tenant_id: TenantId,
        principal_id: PrincipalId,
        email: String,
        link: String,
    },
    /// Password reset link carrying the plain reset token.
    PasswordReset {
        principal_id: PrincipalId,
        email: String,
        token: String,
        link: String,
    },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Notification::VerifyEmail { email, .. } | Notification::PasswordReset { email, .. } => {
                email
            }
        }
    }
}

/// Notification dispatch collaborator.
pub trait Notifier: Send + Sync {
    fn dispatch(&self, notification: Notification);
}

/// Writes notifications to the log. Tokens and links are not logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn dispatch(&self, notification: Notification) {
        match &notification {
            Notification::VerifyEmail { principal_id, .. } => {
                info!("Verification e-mail queued for principal {}", principal_id)
            }
            Notification::PasswordReset { principal_id, .. } => {
                info!("Password reset e-mail queued for principal {}", principal_id)
            }
        }
    }
}

/// Keeps every notification in memory. Clones share the same outbox.
#[derive(Debug, Clone, Default)]
pub struct OutboxNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything dispatched so far, oldest first.
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Remove and return everything dispatched so far.
    pub fn drain(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(mut sent) => std::mem::take(&mut *sent),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl Notifier for OutboxNotifier {
    fn dispatch(&self, notification: Notification) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(_) => warn!("Outbox lock poisoned; dropping notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn outbox_records_and_drains() {
        let outbox = OutboxNotifier::new();
        let shared = outbox.clone();
        shared.dispatch(Notification::PasswordReset {
            principal_id: PrincipalId::from_uuid(Uuid::new_v4()),
            email: "ana@escuela.mx".into(),
            token: "t".into(),
            link: "l".into(),
        });

        assert_eq!(outbox.sent().len(), 1);
        assert_eq!(outbox.sent()[0].recipient(), "ana@escuela.mx");
        assert_eq!(outbox.drain().len(), 1);
        assert!(outbox.sent().is_empty());
    }
}
