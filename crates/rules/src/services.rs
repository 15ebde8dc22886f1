//! Collaborators plugins are built with.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use crate::error::RulesError;

/// Source of selectable countries.
pub trait CountryManager: Send + Sync {
    /// Enabled countries: ISO alpha-2 code → display name.
    fn enabled_list(&self) -> BTreeMap<String, String>;
}

pub trait BanIpManager: Send + Sync {
    fn ban_ip(&self, ip: IpAddr) -> Result<(), RulesError>;

    fn unban_ip(&self, ip: IpAddr) -> Result<(), RulesError>;

    fn is_banned(&self, ip: IpAddr) -> Result<bool, RulesError>;
}

/// Fixed country list.
#[derive(Debug, Clone, Default)]
pub struct StaticCountryManager {
    countries: BTreeMap<String, String>,
}

impl StaticCountryManager {
    pub fn new<I, C, N>(countries: I) -> Self
    where
        I: IntoIterator<Item = (C, N)>,
        C: Into<String>,
        N: Into<String>,
    {
        Self {
            countries: countries
                .into_iter()
                .map(|(code, name)| (code.into().to_ascii_uppercase(), name.into()))
                .collect(),
        }
    }
}

impl CountryManager for StaticCountryManager {
    fn enabled_list(&self) -> BTreeMap<String, String> {
        self.countries.clone()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBanIpManager {
    banned: RwLock<BTreeSet<IpAddr>>,
}

impl InMemoryBanIpManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BanIpManager for InMemoryBanIpManager {
    fn ban_ip(&self, ip: IpAddr) -> Result<(), RulesError> {
        let mut banned = self
            .banned
            .write()
            .map_err(|_| RulesError::Ban("lock poisoned".to_string()))?;
        banned.insert(ip);
        Ok(())
    }

    fn unban_ip(&self, ip: IpAddr) -> Result<(), RulesError> {
        let mut banned = self
            .banned
            .write()
            .map_err(|_| RulesError::Ban("lock poisoned".to_string()))?;
        banned.remove(&ip);
        Ok(())
    }

    fn is_banned(&self, ip: IpAddr) -> Result<bool, RulesError> {
        let banned = self
            .banned
            .read()
            .map_err(|_| RulesError::Ban("lock poisoned".to_string()))?;
        Ok(banned.contains(&ip))
    }
}

/// Everything a plugin factory may hand to a plugin.
#[derive(Clone)]
pub struct Services {
    pub countries: Arc<dyn CountryManager>,
    pub bans: Arc<dyn BanIpManager>,
}

impl Services {
    pub fn new(countries: Arc<dyn CountryManager>, bans: Arc<dyn BanIpManager>) -> Self {
        Self { countries, bans }
    }
}

impl core::fmt::Debug for Services {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
