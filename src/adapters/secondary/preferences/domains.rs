/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Preference store over the on-disk preference domains
//!
//! Reads walk the same scopes `cfprefsd` consults, most specific first.
//! Writes target the any-user, current-host domain
//! (`/Library/Preferences/ByHost/<id>.<host-uuid>`) and go through
//! `defaults import` so the daemon's cache stays coherent.

use crate::adapters::secondary::command::binaries::{BinaryRunner, Invocation, DEFAULTS, SYSCTL};
use crate::domain::{PreferenceError, ReportValue};
use crate::ports::{CommandExecutor, PreferenceStore};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

lazy_static! {
    static ref HOST_UUID_RE: Regex = Regex::new(
        r"^(?:[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}|[0-9a-f]{12})$"
    )
    .unwrap();
}

const GLOBAL_DOMAIN: &str = ".GlobalPreferences";

/// Preference store reading plist domains and writing via `defaults`
pub struct PlistPreferenceStore {
    runner: BinaryRunner,
    root: PathBuf,
    home: Option<PathBuf>,
    host_uuid: Option<String>,
}

impl PlistPreferenceStore {
    /// Store for the running system and the current user's home
    pub fn new(command_executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            runner: BinaryRunner::new(command_executor),
            root: PathBuf::from("/"),
            home: std::env::var_os("HOME").map(PathBuf::from),
            host_uuid: None,
        }
    }

    /// Resolve system scopes below another root
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Resolve user scopes below another home directory
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Host UUID naming the ByHost domain files
    pub fn with_host_uuid(mut self, uuid: &str) -> Self {
        self.host_uuid = Some(uuid.to_string());
        self
    }

    fn system_preferences(&self) -> PathBuf {
        self.root.join("Library").join("Preferences")
    }

    fn user_preferences(&self) -> Option<PathBuf> {
        self.home
            .as_ref()
            .map(|home| home.join("Library").join("Preferences"))
    }

    /// Any-user, current-host domain path without the `.plist` extension
    fn host_domain(&self, bundle_id: &str, host: &str) -> PathBuf {
        self.system_preferences()
            .join("ByHost")
            .join(format!("{bundle_id}.{host}"))
    }

    /// Hardware UUID naming this machine's ByHost files
    async fn current_host(&self) -> Result<String, PreferenceError> {
        if let Some(ref uuid) = self.host_uuid {
            return Ok(uuid.clone());
        }
        let uuid = self.runner.text(&SYSCTL, &["-n", "kern.uuid"]).await?;
        Ok(uuid.trim().to_string())
    }

    async fn by_host_path(&self, preferences: &Path, bundle_id: &str) -> Option<PathBuf> {
        let by_host = preferences.join("ByHost");

        if let Some(ref uuid) = self.host_uuid {
            return Some(by_host.join(format!("{bundle_id}.{uuid}.plist")));
        }

        let prefix = format!("{bundle_id}.");
        let mut entries = tokio::fs::read_dir(&by_host).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let host = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".plist"));
            if host.is_some_and(|host| HOST_UUID_RE.is_match(host)) {
                return Some(entry.path());
            }
        }
        None
    }

    /// Domain files consulted for `bundle_id`, highest precedence first
    pub async fn search_paths(&self, bundle_id: &str) -> Vec<PathBuf> {
        let file = format!("{bundle_id}.plist");
        let global = format!("{GLOBAL_DOMAIN}.plist");
        let user = self.user_preferences();
        let system = self.system_preferences();

        let mut paths = vec![self
            .root
            .join("Library")
            .join("Managed Preferences")
            .join(&file)];
        if let Some(ref user) = user {
            if let Some(by_host) = self.by_host_path(user, bundle_id).await {
                paths.push(by_host);
            }
            paths.push(user.join(&file));
        }
        if let Some(by_host) = self.by_host_path(&system, bundle_id).await {
            paths.push(by_host);
        }
        paths.push(system.join(&file));
        if let Some(ref user) = user {
            paths.push(user.join(&global));
        }
        paths.push(system.join(&global));
        paths
    }
}

async fn load_domain(path: &Path) -> Result<Option<plist::Dictionary>, PreferenceError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PreferenceError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        }
    };

    match plist::Value::from_reader(Cursor::new(bytes)) {
        Ok(plist::Value::Dictionary(dict)) => Ok(Some(dict)),
        Ok(_) => Err(PreferenceError::Parse {
            path: path.display().to_string(),
            reason: "top level is not a dictionary".to_string(),
        }),
        Err(e) => Err(PreferenceError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

#[async_trait]
impl PreferenceStore for PlistPreferenceStore {
    async fn read(&self, bundle_id: &str, key: &str) -> Result<Option<ReportValue>, PreferenceError> {
        for path in self.search_paths(bundle_id).await {
            let domain = match load_domain(&path).await {
                Ok(Some(domain)) => domain,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Skipping preference domain: {}", e);
                    continue;
                }
            };

            if let Some(value) = domain.get(key) {
                log::debug!("{} {} read from {}", bundle_id, key, path.display());
                return Ok(Some(ReportValue::from(value.clone())));
            }
        }
        Ok(None)
    }

    async fn write(
        &self,
        key: &str,
        value: &ReportValue,
        bundle_id: &str,
    ) -> Result<(), PreferenceError> {
        let host = self.current_host().await?;
        let domain_path = self.host_domain(bundle_id, &host);
        let file = domain_path.with_file_name(format!("{bundle_id}.{host}.plist"));

        let mut domain = load_domain(&file).await?.unwrap_or_default();
        match value.to_plist() {
            Some(v) => {
                domain.insert(key.to_string(), v);
            }
            // Setting null removes the key, as CFPreferences does
            None => {
                domain.remove(key);
            }
        }

        let mut xml = Vec::new();
        plist::Value::Dictionary(domain)
            .to_writer_xml(&mut xml)
            .map_err(|e| PreferenceError::Serialization(e.to_string()))?;
        let xml = String::from_utf8(xml)
            .map_err(|e| PreferenceError::Serialization(e.to_string()))?;

        let target = domain_path.display().to_string();
        let invocation = Invocation::new(&["import", target.as_str(), "-"])
            .stdin(&xml)
            .capture_output(false);
        self.runner.run(&DEFAULTS, invocation).await?;

        log::info!("Wrote {} {} to {}", bundle_id, key, target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CannedCommandExecutor;
    use std::fs;

    const BUNDLE: &str = "com.github.munkireport";
    const HOST: &str = "0F8E3F52-5C36-5B1D-9A4E-1A2B3C4D5E6F";

    fn write_domain(path: &Path, entries: &[(&str, plist::Value)]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut dict = plist::Dictionary::new();
        for (key, value) in entries {
            dict.insert(key.to_string(), value.clone());
        }
        plist::Value::Dictionary(dict).to_file_xml(path).unwrap();
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        home: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("root");
            let home = dir.path().join("home");
            Self {
                _dir: dir,
                root,
                home,
            }
        }

        fn store(&self, executor: CannedCommandExecutor) -> PlistPreferenceStore {
            PlistPreferenceStore::new(Arc::new(executor))
                .with_root(&self.root)
                .with_home(&self.home)
        }

        fn system(&self, file: &str) -> PathBuf {
            self.root.join("Library/Preferences").join(file)
        }

        fn user(&self, file: &str) -> PathBuf {
            self.home.join("Library/Preferences").join(file)
        }

        /// Current-host domain, as handed to `defaults import`
        fn host_domain(&self) -> PathBuf {
            self.system(&format!("ByHost/{BUNDLE}.{HOST}"))
        }
    }

    #[tokio::test]
    async fn test_precedence_managed_over_user_over_system() {
        let fx = Fixture::new();
        let file = format!("{BUNDLE}.plist");
        write_domain(
            &fx.system(&file),
            &[
                ("BaseUrl", "https://system".into()),
                ("Passphrase", "system".into()),
                ("ReportItems", "system".into()),
            ],
        );
        write_domain(
            &fx.user(&file),
            &[("BaseUrl", "https://user".into()), ("Passphrase", "user".into())],
        );
        write_domain(
            &fx.root.join("Library/Managed Preferences").join(&file),
            &[("BaseUrl", "https://managed".into())],
        );

        let store = fx.store(CannedCommandExecutor::new());

        assert_eq!(
            store.read(BUNDLE, "BaseUrl").await.unwrap(),
            Some(ReportValue::from("https://managed"))
        );
        assert_eq!(
            store.read(BUNDLE, "Passphrase").await.unwrap(),
            Some(ReportValue::from("user"))
        );
        assert_eq!(
            store.read(BUNDLE, "ReportItems").await.unwrap(),
            Some(ReportValue::from("system"))
        );
        assert_eq!(store.read(BUNDLE, "Missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_by_host_domain_is_discovered() {
        let fx = Fixture::new();
        write_domain(
            &fx.user(&format!("ByHost/{BUNDLE}.{HOST}.plist")),
            &[("FollowHTTPRedirects", true.into())],
        );
        // Another domain sharing the prefix must not be picked up
        write_domain(
            &fx.user(&format!("ByHost/{BUNDLE}.extra.{HOST}.plist")),
            &[("FollowHTTPRedirects", false.into())],
        );

        let store = fx.store(CannedCommandExecutor::new());
        assert_eq!(
            store.read(BUNDLE, "FollowHTTPRedirects").await.unwrap(),
            Some(ReportValue::Bool(true))
        );

        let pinned = fx.store(CannedCommandExecutor::new()).with_host_uuid("0000");
        assert_eq!(pinned.read(BUNDLE, "FollowHTTPRedirects").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_global_preferences_fallback() {
        let fx = Fixture::new();
        write_domain(
            &fx.system(".GlobalPreferences.plist"),
            &[("AppleLocale", "de_DE".into())],
        );

        let store = fx.store(CannedCommandExecutor::new());
        assert_eq!(
            store.read(BUNDLE, "AppleLocale").await.unwrap(),
            Some(ReportValue::from("de_DE"))
        );
    }

    #[tokio::test]
    async fn test_corrupt_domain_is_skipped() {
        let fx = Fixture::new();
        let file = format!("{BUNDLE}.plist");
        fs::create_dir_all(fx.user("")).unwrap();
        fs::write(fx.user(&file), b"not a plist").unwrap();
        write_domain(&fx.system(&file), &[("BaseUrl", "https://system".into())]);

        let store = fx.store(CannedCommandExecutor::new());
        assert_eq!(
            store.read(BUNDLE, "BaseUrl").await.unwrap(),
            Some(ReportValue::from("https://system"))
        );
    }

    #[tokio::test]
    async fn test_write_imports_updated_domain() {
        let fx = Fixture::new();
        write_domain(
            &fx.system(&format!("ByHost/{BUNDLE}.{HOST}.plist")),
            &[("BaseUrl", "https://system".into())],
        );

        let target = fx.host_domain().display().to_string();
        let executor = Arc::new(CannedCommandExecutor::new().with_stdout(
            "/usr/bin/defaults",
            &["import", target.as_str(), "-"],
            "",
        ));
        let store = PlistPreferenceStore::new(executor.clone())
            .with_root(&fx.root)
            .with_home(&fx.home)
            .with_host_uuid(HOST);

        store
            .write("Passphrase", &ReportValue::from("secret"), BUNDLE)
            .await
            .unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        let xml = calls[0].stdin.clone().unwrap();
        let imported = plist::Value::from_reader_xml(xml.as_bytes()).unwrap();
        let imported = imported.as_dictionary().unwrap();
        assert_eq!(
            imported.get("Passphrase").and_then(|v| v.as_string()),
            Some("secret")
        );
        assert_eq!(
            imported.get("BaseUrl").and_then(|v| v.as_string()),
            Some("https://system")
        );
    }

    #[tokio::test]
    async fn test_write_null_removes_key() {
        let fx = Fixture::new();
        write_domain(
            &fx.system(&format!("ByHost/{BUNDLE}.{HOST}.plist")),
            &[("Passphrase", "old".into())],
        );

        let target = fx.host_domain().display().to_string();
        let executor = Arc::new(CannedCommandExecutor::new().with_stdout(
            "/usr/bin/defaults",
            &["import", target.as_str(), "-"],
            "",
        ));
        let store = PlistPreferenceStore::new(executor.clone())
            .with_root(&fx.root)
            .with_host_uuid(HOST);

        store.write("Passphrase", &ReportValue::Null, BUNDLE).await.unwrap();

        let xml = executor.calls()[0].stdin.clone().unwrap();
        let imported = plist::Value::from_reader_xml(xml.as_bytes()).unwrap();
        assert!(imported.as_dictionary().unwrap().get("Passphrase").is_none());
    }

    #[tokio::test]
    async fn test_write_reports_defaults_failure() {
        let fx = Fixture::new();
        let target = fx.host_domain().display().to_string();
        let store = fx
            .store(CannedCommandExecutor::new().with_output(
                "/usr/bin/defaults",
                &["import", target.as_str(), "-"],
                crate::ports::CommandOutput::new("", "Could not write domain", 1),
            ))
            .with_host_uuid(HOST);

        let err = store
            .write("BaseUrl", &ReportValue::from("https://x"), BUNDLE)
            .await
            .unwrap_err();
        assert!(matches!(err, PreferenceError::Command(_)));
    }

    #[tokio::test]
    async fn test_write_targets_current_host_domain() {
        let fx = Fixture::new();
        let target = fx.host_domain().display().to_string();
        let executor = Arc::new(
            CannedCommandExecutor::new()
                .with_stdout("/usr/sbin/sysctl", &["-n", "kern.uuid"], &format!("{HOST}\n"))
                .with_stdout("/usr/bin/defaults", &["import", target.as_str(), "-"], ""),
        );
        let store = PlistPreferenceStore::new(executor.clone())
            .with_root(&fx.root)
            .with_home(&fx.home);

        store
            .write("BaseUrl", &ReportValue::from("https://host"), BUNDLE)
            .await
            .unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].args, vec!["import", target.as_str(), "-"]);
    }

    #[tokio::test]
    async fn test_system_by_host_domain_beats_system_domain() {
        let fx = Fixture::new();
        write_domain(
            &fx.system(&format!("{BUNDLE}.plist")),
            &[("BaseUrl", "https://system".into())],
        );
        write_domain(
            &fx.system(&format!("ByHost/{BUNDLE}.{HOST}.plist")),
            &[("BaseUrl", "https://host".into())],
        );

        let store = fx.store(CannedCommandExecutor::new());
        assert_eq!(
            store.read(BUNDLE, "BaseUrl").await.unwrap(),
            Some(ReportValue::from("https://host"))
        );

        let paths = store.search_paths(BUNDLE).await;
        let host = paths
            .iter()
            .position(|p| p.starts_with(fx.system("ByHost")))
            .unwrap();
        let system = paths
            .iter()
            .position(|p| *p == fx.system(&format!("{BUNDLE}.plist")))
            .unwrap();
        assert!(host < system);
    }
}
