use std::net::IpAddr;
use std::sync::Arc;

use crate::context::{ContextDefinition, ExecutionContext};
use crate::error::RulesError;
use crate::plugin::{Action, PluginDefinition};
use crate::services::BanIpManager;

/// Lifts the ban on an address. Without an `ip` context the current client's
/// address is used.
pub struct UnbanIpAction {
    bans: Arc<dyn BanIpManager>,
}

impl UnbanIpAction {
    pub const ID: &'static str = "rules_unban_ip";

    pub fn new(bans: Arc<dyn BanIpManager>) -> Self {
        Self { bans }
    }

    fn target(ctx: &ExecutionContext) -> Result<IpAddr, RulesError> {
        match ctx.text("ip")? {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| RulesError::InvalidIp(raw.to_string())),
            None => ctx.client_ip().ok_or(RulesError::NoClientIp),
        }
    }
}

impl Action for UnbanIpAction {
    fn definition(&self) -> PluginDefinition {
        PluginDefinition {
            id: Self::ID,
            label: "Unban IP",
            category: "Ban",
            contexts: vec![ContextDefinition {
                name: "ip",
                label: "IP Address",
                required: false,
                multiple: false,
            }],
        }
    }

    fn summary(&self) -> String {
        "Remove the ban on an IP address".to_string()
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<(), RulesError> {
        let ip = Self::target(ctx)?;
        self.bans.unban_ip(ip)?;
        tracing::info!(%ip, "ip address unbanned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextValue;
    use std::sync::Mutex;

    /// Records every unban call.
    #[derive(Default)]
    struct RecordingBans {
        unbanned: Mutex<Vec<IpAddr>>,
    }

    impl RecordingBans {
        fn calls(&self) -> Vec<IpAddr> {
            self.unbanned.lock().unwrap().clone()
        }
    }

    impl BanIpManager for RecordingBans {
        fn ban_ip(&self, _ip: IpAddr) -> Result<(), RulesError> {
            Ok(())
        }

        fn unban_ip(&self, ip: IpAddr) -> Result<(), RulesError> {
            self.unbanned.lock().unwrap().push(ip);
            Ok(())
        }

        fn is_banned(&self, _ip: IpAddr) -> Result<bool, RulesError> {
            Ok(false)
        }
    }

    fn action() -> (UnbanIpAction, Arc<RecordingBans>) {
        let bans = Arc::new(RecordingBans::default());
        (UnbanIpAction::new(bans.clone()), bans)
    }

    #[test]
    fn summary() {
        let (action, _) = action();
        assert_eq!(action.summary(), "Remove the ban on an IP address");
    }

    #[test]
    fn unbans_ipv4_from_context() {
        let (action, bans) = action();
        let ctx = ExecutionContext::new().with("ip", ContextValue::Text("192.0.2.0".to_string()));

        action.execute(&ctx).unwrap();

        assert_eq!(bans.calls(), vec!["192.0.2.0".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn unbans_ipv6_from_context() {
        let (action, bans) = action();
        let ctx = ExecutionContext::new()
            .with("ip", ContextValue::Text("2002:0:0:0:0:0:c000:200".to_string()));

        action.execute(&ctx).unwrap();

        assert_eq!(bans.calls(), vec!["2002::c000:200".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn falls_back_to_client_ip() {
        let (action, bans) = action();
        let client: IpAddr = "192.0.2.0".parse().unwrap();
        let ctx = ExecutionContext::new().with_client_ip(client);

        action.execute(&ctx).unwrap();

        assert_eq!(bans.calls(), vec![client]);
    }

    #[test]
    fn context_ip_takes_precedence_over_client_ip() {
        let (action, bans) = action();
        let ctx = ExecutionContext::new()
            .with("ip", ContextValue::Text("198.51.100.7".to_string()))
            .with_client_ip("192.0.2.0".parse().unwrap());

        action.execute(&ctx).unwrap();

        assert_eq!(bans.calls(), vec!["198.51.100.7".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn malformed_or_missing_address_fails_without_calling() {
        let (action, bans) = action();
        let bad = ExecutionContext::new().with("ip", ContextValue::Text("999.1.1.1".to_string()));

        assert_eq!(
            action.execute(&bad).unwrap_err(),
            RulesError::InvalidIp("999.1.1.1".to_string())
        );
        assert_eq!(action.execute(&ExecutionContext::new()).unwrap_err(), RulesError::NoClientIp);
        assert!(bans.calls().is_empty());
    }
}
