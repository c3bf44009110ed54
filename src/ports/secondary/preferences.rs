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

use crate::domain::{PreferenceError, ReportValue};
use async_trait::async_trait;

/// Secondary port - Preference domain access
///
/// Reads and writes single keys of a bundle identifier's preference domain.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Read a preference key from a bundle id
    ///
    /// Managed (profile) values win over host, user and system values.
    ///
    /// # Returns
    /// * `Ok(Some(value))` - The effective value
    /// * `Ok(None)` - The key is not set in any scope
    /// * `Err(PreferenceError)` - Error reading the preference domain
    async fn read(&self, bundle_id: &str, key: &str) -> Result<Option<ReportValue>, PreferenceError>;

    /// Write a preference key for all users of this host
    async fn write(
        &self,
        key: &str,
        value: &ReportValue,
        bundle_id: &str,
    ) -> Result<(), PreferenceError>;
}
