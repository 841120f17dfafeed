//! Notification delivery with a bounded fallback chain.
//!
//! Order of attempts:
//! - `alternate` style goes straight to the in-app banner
//! - otherwise the system channel is tried optimistically
//! - on failure, permission is checked (and requested if missing); if it is
//!   granted the system channel gets exactly one retry
//! - anything still failing ends in the banner, with the body annotated
//!
//! After a delivered or fallback notification the host surface is asked to
//! restore itself. That step never changes the outcome.

pub mod desktop;
pub mod traits;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

pub use traits::{
    Banner, Notification, NotifyError, Permission, PermissionState, SystemChannel, WindowControl,
};

const SYSTEM_FAILURE_NOTE: &str = "(system notification unavailable, shown in-app)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStyle {
    #[default]
    System,
    Alternate,
}

impl fmt::Display for DeliveryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStyle::System => write!(f, "system"),
            DeliveryStyle::Alternate => write!(f, "alternate"),
        }
    }
}

impl FromStr for DeliveryStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(DeliveryStyle::System),
            "alternate" | "in-app" => Ok(DeliveryStyle::Alternate),
            other => Err(anyhow::anyhow!(
                "unknown delivery style '{other}' (expected system or alternate)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    ShownAsFallback,
    Failed,
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::ShownAsFallback => "fallback",
            DeliveryOutcome::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One state of the fallback chain. `Retry` is only reachable from
/// `CheckPermission`, which bounds the system channel to two sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    System,
    CheckPermission,
    Retry,
    Banner { system_failed: bool },
    Done(DeliveryOutcome),
}

#[derive(Clone)]
pub struct Notifier {
    system: Arc<dyn SystemChannel>,
    permission: Arc<dyn Permission>,
    banner: Arc<dyn Banner>,
    window: Arc<dyn WindowControl>,
    style: Arc<RwLock<DeliveryStyle>>,
}

impl Notifier {
    pub fn new(
        system: Arc<dyn SystemChannel>,
        permission: Arc<dyn Permission>,
        banner: Arc<dyn Banner>,
        window: Arc<dyn WindowControl>,
        style: DeliveryStyle,
    ) -> Self {
        Self {
            system,
            permission,
            banner,
            window,
            style: Arc::new(RwLock::new(style)),
        }
    }

    pub fn style(&self) -> DeliveryStyle {
        *self.style.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_style(&self, style: DeliveryStyle) {
        *self.style.write().unwrap_or_else(|e| e.into_inner()) = style;
        info!(style = %style, "Delivery style updated");
    }

    pub async fn deliver(&self, title: &str, body: &str) -> DeliveryOutcome {
        let notification = Notification::new(title, body);
        let mut step = match self.style() {
            DeliveryStyle::Alternate => Step::Banner {
                system_failed: false,
            },
            DeliveryStyle::System => Step::System,
        };

        let outcome = loop {
            step = match step {
                Step::System => match self.system.send(&notification).await {
                    Ok(()) => Step::Done(DeliveryOutcome::Delivered),
                    Err(e) => {
                        warn!(
                            channel = self.system.channel_name(),
                            error = %e,
                            "System notification failed"
                        );
                        Step::CheckPermission
                    }
                },
                Step::CheckPermission => {
                    let granted = self.permission.is_granted().await
                        || self.permission.request().await == PermissionState::Granted;
                    if granted {
                        Step::Retry
                    } else {
                        debug!("System notification permission not granted");
                        Step::Banner {
                            system_failed: true,
                        }
                    }
                }
                Step::Retry => match self.system.send(&notification).await {
                    Ok(()) => Step::Done(DeliveryOutcome::Delivered),
                    Err(e) => {
                        warn!(
                            channel = self.system.channel_name(),
                            error = %e,
                            "System notification retry failed"
                        );
                        Step::Banner {
                            system_failed: true,
                        }
                    }
                },
                Step::Banner { system_failed } => {
                    let shown = if system_failed {
                        Notification::new(
                            notification.title.clone(),
                            annotate_system_failure(&notification.body),
                        )
                    } else {
                        notification.clone()
                    };
                    match self.banner.show(&shown).await {
                        Ok(()) => Step::Done(DeliveryOutcome::ShownAsFallback),
                        Err(e) => {
                            warn!(error = %e, "In-app banner failed");
                            Step::Done(DeliveryOutcome::Failed)
                        }
                    }
                }
                Step::Done(outcome) => break outcome,
            };
        };

        if outcome != DeliveryOutcome::Failed {
            if let Err(e) = self.window.restore().await {
                warn!(error = %e, "Failed to restore host surface");
            }
        }
        outcome
    }

    /// Sends a test notification through the system channel only.
    pub async fn send_test(&self) -> Result<(), NotifyError> {
        let notification = Notification::new(
            "femtoalarm test",
            "System notifications are working.",
        );
        self.system.send(&notification).await
    }
}

pub fn annotate_system_failure(body: &str) -> String {
    if body.is_empty() {
        SYSTEM_FAILURE_NOTE.to_string()
    } else {
        format!("{body}\n{SYSTEM_FAILURE_NOTE}")
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails the first `fail_first` sends, then succeeds.
    pub struct MockSystem {
        pub sends: Arc<AtomicUsize>,
        pub fail_first: usize,
    }

    #[async_trait::async_trait]
    impl SystemChannel for MockSystem {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            let n = self.sends.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(NotifyError::Timeout(1))
            } else {
                Ok(())
            }
        }

        fn channel_name(&self) -> &str {
            "mock"
        }
    }

    pub struct MockPermission {
        pub granted: AtomicBool,
        pub grant_on_request: bool,
        pub requests: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Permission for MockPermission {
        async fn is_granted(&self) -> bool {
            self.granted.load(Ordering::SeqCst)
        }

        async fn request(&self) -> PermissionState {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.grant_on_request {
                self.granted.store(true, Ordering::SeqCst);
                PermissionState::Granted
            } else {
                PermissionState::Denied
            }
        }
    }

    pub struct MockBanner {
        pub shown: Arc<Mutex<Vec<Notification>>>,
        pub fail: bool,
    }

    #[async_trait::async_trait]
    impl Banner for MockBanner {
        async fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::HostClosed);
            }
            self.shown.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    pub struct MockWindow {
        pub restores: Arc<AtomicUsize>,
        pub fail: bool,
    }

    #[async_trait::async_trait]
    impl WindowControl for MockWindow {
        async fn restore(&self) -> Result<(), NotifyError> {
            self.restores.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::HostClosed)
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    pub struct MockHandles {
        pub sends: Arc<AtomicUsize>,
        pub requests: Arc<AtomicUsize>,
        pub restores: Arc<AtomicUsize>,
        pub shown: Arc<Mutex<Vec<Notification>>>,
    }

    pub struct MockSetup {
        pub fail_first: usize,
        pub granted: bool,
        pub grant_on_request: bool,
        pub banner_fails: bool,
        pub window_fails: bool,
        pub style: DeliveryStyle,
    }

    impl Default for MockSetup {
        fn default() -> Self {
            Self {
                fail_first: 0,
                granted: true,
                grant_on_request: false,
                banner_fails: false,
                window_fails: false,
                style: DeliveryStyle::System,
            }
        }
    }

    pub fn mock_notifier(setup: MockSetup) -> (Notifier, MockHandles) {
        let handles = MockHandles::default();
        let system = Arc::new(MockSystem {
            sends: handles.sends.clone(),
            fail_first: setup.fail_first,
        });
        notifier_with_system(system, setup, handles)
    }

    /// Like [`mock_notifier`] but with a caller-supplied system channel.
    pub fn notifier_with_system(
        system: Arc<dyn SystemChannel>,
        setup: MockSetup,
        handles: MockHandles,
    ) -> (Notifier, MockHandles) {
        let notifier = Notifier::new(
            system,
            Arc::new(MockPermission {
                granted: AtomicBool::new(setup.granted),
                grant_on_request: setup.grant_on_request,
                requests: handles.requests.clone(),
            }),
            Arc::new(MockBanner {
                shown: handles.shown.clone(),
                fail: setup.banner_fails,
            }),
            Arc::new(MockWindow {
                restores: handles.restores.clone(),
                fail: setup.window_fails,
            }),
            setup.style,
        );
        (notifier, handles)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{mock_notifier, MockSetup};
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn system_success_is_delivered() {
        let (notifier, handles) = mock_notifier(MockSetup::default());
        let outcome = notifier.deliver("Wake", "07:00").await;
        assert_eq!(outcome, DeliveryOutcome::Delivered);
        assert_eq!(handles.sends.load(Ordering::SeqCst), 1);
        assert_eq!(handles.restores.load(Ordering::SeqCst), 1);
        assert!(handles.shown.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn alternate_style_skips_system_channel() {
        let (notifier, handles) = mock_notifier(MockSetup {
            style: DeliveryStyle::Alternate,
            ..Default::default()
        });
        let outcome = notifier.deliver("Wake", "07:00").await;
        assert_eq!(outcome, DeliveryOutcome::ShownAsFallback);
        assert_eq!(handles.sends.load(Ordering::SeqCst), 0);
        let shown = handles.shown.lock().unwrap();
        assert_eq!(shown.as_slice(), &[Notification::new("Wake", "07:00")]);
    }

    #[tokio::test]
    async fn denied_permission_falls_back_with_annotation() {
        let (notifier, handles) = mock_notifier(MockSetup {
            fail_first: usize::MAX,
            granted: false,
            grant_on_request: false,
            ..Default::default()
        });
        let outcome = notifier.deliver("Wake", "07:00").await;
        assert_eq!(outcome, DeliveryOutcome::ShownAsFallback);
        assert_eq!(handles.sends.load(Ordering::SeqCst), 1);
        assert_eq!(handles.requests.load(Ordering::SeqCst), 1);
        let shown = handles.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].body, annotate_system_failure("07:00"));
        assert_ne!(shown[0].body, "07:00");
    }

    #[tokio::test]
    async fn granted_after_request_retries_once() {
        let (notifier, handles) = mock_notifier(MockSetup {
            fail_first: 1,
            granted: false,
            grant_on_request: true,
            ..Default::default()
        });
        let outcome = notifier.deliver("Wake", "07:00").await;
        assert_eq!(outcome, DeliveryOutcome::Delivered);
        assert_eq!(handles.sends.load(Ordering::SeqCst), 2);
        assert_eq!(handles.requests.load(Ordering::SeqCst), 1);
        assert!(handles.shown.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn already_granted_skips_request() {
        let (notifier, handles) = mock_notifier(MockSetup {
            fail_first: 1,
            granted: true,
            ..Default::default()
        });
        assert_eq!(
            notifier.deliver("Wake", "").await,
            DeliveryOutcome::Delivered
        );
        assert_eq!(handles.requests.load(Ordering::SeqCst), 0);
        assert_eq!(handles.sends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_retry_is_bounded_and_falls_back() {
        let (notifier, handles) = mock_notifier(MockSetup {
            fail_first: usize::MAX,
            granted: true,
            ..Default::default()
        });
        let outcome = notifier.deliver("Wake", "07:00").await;
        assert_eq!(outcome, DeliveryOutcome::ShownAsFallback);
        assert_eq!(handles.sends.load(Ordering::SeqCst), 2);
        assert_eq!(
            handles.shown.lock().unwrap()[0].body,
            annotate_system_failure("07:00")
        );
    }

    #[tokio::test]
    async fn banner_failure_is_failed_without_restore() {
        let (notifier, handles) = mock_notifier(MockSetup {
            fail_first: usize::MAX,
            granted: false,
            banner_fails: true,
            ..Default::default()
        });
        assert_eq!(
            notifier.deliver("Wake", "07:00").await,
            DeliveryOutcome::Failed
        );
        assert_eq!(handles.restores.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn restore_failure_does_not_change_outcome() {
        let (notifier, handles) = mock_notifier(MockSetup {
            window_fails: true,
            ..Default::default()
        });
        assert_eq!(
            notifier.deliver("Wake", "07:00").await,
            DeliveryOutcome::Delivered
        );
        assert_eq!(handles.restores.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn style_override_takes_effect() {
        let (notifier, handles) = mock_notifier(MockSetup::default());
        notifier.set_style(DeliveryStyle::Alternate);
        assert_eq!(notifier.style(), DeliveryStyle::Alternate);
        assert_eq!(
            notifier.deliver("Wake", "07:00").await,
            DeliveryOutcome::ShownAsFallback
        );
        assert_eq!(handles.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn send_test_uses_system_channel_only() {
        let (notifier, handles) = mock_notifier(MockSetup {
            fail_first: 1,
            ..Default::default()
        });
        assert!(notifier.send_test().await.is_err());
        assert_eq!(handles.sends.load(Ordering::SeqCst), 1);
        assert_eq!(handles.requests.load(Ordering::SeqCst), 0);
        assert!(handles.shown.lock().unwrap().is_empty());
    }

    #[test]
    fn delivery_style_parsing() {
        assert_eq!(
            "Alternate".parse::<DeliveryStyle>().unwrap(),
            DeliveryStyle::Alternate
        );
        assert_eq!(
            "system".parse::<DeliveryStyle>().unwrap(),
            DeliveryStyle::System
        );
        assert!("banner".parse::<DeliveryStyle>().is_err());
    }
}
